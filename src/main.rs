mod classify;
mod config;
mod html;
mod http;
mod ingest;
mod metrics;
mod snapshot;
mod state;
mod transport;
mod view;

use axum::serve;
use clap::Parser;
use config::Config;
use ingest::Ingestor;
use metrics::Metrics;
use state::DashboardState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transport::MqttTransport;

#[derive(Parser, Debug)]
#[command(name = "healthdash")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    let endpoint = match cfg.broker.endpoint() {
        Ok(endpoint) => endpoint,
        Err(err) => {
            error!(error = %err, "invalid broker url");
            std::process::exit(1);
        }
    };
    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };

    info!(
        listen = %cfg.listen,
        broker = %endpoint,
        topic = %cfg.broker.topic,
        "starting healthdash"
    );

    let shared_state = Arc::new(RwLock::new(DashboardState::new()));
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let metrics = metrics.clone();
        let http_state = shared_state.clone();
        let refresh_secs = cfg.refresh_secs;
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics, http_state, refresh_secs);
            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "failed to bind dashboard HTTP server");
                    return;
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "dashboard HTTP server error");
            }
        })
    };

    let ingest_task = {
        let ingestor = Ingestor::new(MqttTransport, &cfg.broker, shared_state.clone(), metrics);
        let topic = cfg.broker.topic.clone();
        tokio::spawn(ingestor.run(endpoint, topic, shutdown_rx))
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);

    let _ = ingest_task.await;
    let _ = http_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
