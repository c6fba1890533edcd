use crate::html::render_page;
use crate::metrics::Metrics;
use crate::snapshot::SystemMetrics;
use crate::state::DashboardState;
use crate::view::{compose, ApiState};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub state: Arc<RwLock<DashboardState>>,
    pub refresh_secs: u64,
}

pub fn build_router(
    metrics: Arc<Metrics>,
    state: Arc<RwLock<DashboardState>>,
    refresh_secs: u64,
) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/state", get(state_handler))
        .route("/api/history", get(history_handler))
        .with_state(HttpAppState {
            metrics,
            state,
            refresh_secs,
        })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn dashboard_handler(State(state): State<HttpAppState>) -> Html<String> {
    let view = {
        let guard = state.state.read().await;
        compose(&guard)
    };
    Html(render_page(&view, state.refresh_secs))
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn state_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.state.read().await;
    Json(ApiState::from(&*guard))
}

async fn history_handler(State(state): State<HttpAppState>) -> Json<Vec<SystemMetrics>> {
    let guard = state.state.read().await;
    Json(guard.history.iter().map(|s| s.as_ref().clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_json;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    fn shared_state() -> Arc<RwLock<DashboardState>> {
        Arc::new(RwLock::new(DashboardState::new()))
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let metrics = Metrics::new().expect("metrics");
        let app = build_router(metrics, shared_state(), 2);

        let (status, body) = get_text(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_counts_scrapes() {
        let metrics = Metrics::new().expect("metrics");
        let app = build_router(metrics.clone(), shared_state(), 2);

        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("dashboard_broker_connected"));
        assert_eq!(metrics.dashboard_scrape_count_total.get(), 1.0);
    }

    #[tokio::test]
    async fn dashboard_page_follows_state() {
        let metrics = Metrics::new().expect("metrics");
        let state = shared_state();
        let app = build_router(metrics, state.clone(), 3);

        let (status, body) = get_text(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Connecting to MQTT broker..."));

        state.write().await.on_connected();
        let (_, body) = get_text(app.clone(), "/").await;
        assert!(body.contains("Waiting for metrics..."));

        state
            .write()
            .await
            .on_message(snapshot_json("2025-01-01T08:00:00", 45.0, 90.0, 70.0).as_bytes(), 1)
            .expect("valid");
        let (_, body) = get_text(app, "/").await;
        assert!(body.contains("System Monitor"));
        assert!(body.contains("content=\"3\""));
    }

    #[tokio::test]
    async fn api_state_and_history_return_json() {
        let metrics = Metrics::new().expect("metrics");
        let state = shared_state();
        {
            let mut guard = state.write().await;
            guard.on_connected();
            for (i, ts) in ["a", "b"].iter().enumerate() {
                guard
                    .on_message(snapshot_json(ts, 45.0, 90.0, 70.0).as_bytes(), i as i64)
                    .expect("valid");
            }
        }
        let app = build_router(metrics, state, 2);

        let (status, body) = get_text(app.clone(), "/api/state").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["phase"], "receiving");
        assert_eq!(json["view"]["kind"], "metrics");
        assert_eq!(json["view"]["cards"][1]["tier"], "critical");
        assert_eq!(json["view"]["recent"]["rows"].as_array().map(Vec::len), Some(2));

        let (_, body) = get_text(app, "/api/history").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json[0]["timestamp"], "b");
        assert_eq!(json[1]["timestamp"], "a");
    }
}
