use crate::config::BrokerConfig;
use crate::metrics::Metrics;
use crate::state::DashboardState;
use crate::transport::{
    BrokerEndpoint, ConnectOptions, Connection, EventSink, SessionEvent, Transport,
    TransportEvent,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

struct ActiveSession<C> {
    id: u64,
    topic: String,
    connection: C,
}

/// Every connection gets a fresh session number. Events are applied only while
/// their session is the active one, so nothing from a released connection can
/// reach the state.
pub struct Ingestor<T: Transport> {
    transport: T,
    shared_state: Arc<RwLock<DashboardState>>,
    metrics: Arc<Metrics>,
    client_id_prefix: String,
    keep_alive: Duration,
    reconnect_delay: Duration,
    active: Option<ActiveSession<T::Connection>>,
    last_session: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<T: Transport> Ingestor<T> {
    pub fn new(
        transport: T,
        cfg: &BrokerConfig,
        shared_state: Arc<RwLock<DashboardState>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            shared_state,
            metrics,
            client_id_prefix: cfg.client_id_prefix.clone(),
            keep_alive: Duration::from_secs(cfg.keep_alive_secs),
            reconnect_delay: Duration::from_secs(cfg.reconnect_delay_secs),
            active: None,
            last_session: 0,
            events_tx,
            events_rx,
        }
    }

    pub async fn start(&mut self, endpoint: &BrokerEndpoint, topic: &str) {
        self.stop().await;

        self.last_session += 1;
        let session = self.last_session;
        let options = ConnectOptions {
            client_id: client_id(&self.client_id_prefix),
            keep_alive: self.keep_alive,
            reconnect_delay: self.reconnect_delay,
        };

        self.metrics.inc_connect_attempt();
        apply(&self.shared_state, &self.metrics, DashboardState::on_connecting).await;
        info!(
            broker = %endpoint,
            topic,
            client_id = %options.client_id,
            session,
            "connecting to broker"
        );

        let sink = EventSink::new(session, self.events_tx.clone());
        match self.transport.connect(endpoint, &options, sink) {
            Ok(connection) => {
                self.active = Some(ActiveSession {
                    id: session,
                    topic: topic.to_string(),
                    connection,
                });
            }
            Err(err) => {
                error!(broker = %endpoint, error = %err, "failed to open broker connection");
                self.metrics.inc_transport_error();
                apply(&self.shared_state, &self.metrics, DashboardState::on_error).await;
            }
        }
    }

    pub async fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.connection.end();
        info!(session = active.id, "broker connection released");
        apply(&self.shared_state, &self.metrics, DashboardState::on_close).await;
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    // False when the event came from a released connection.
    pub async fn handle(&mut self, event: SessionEvent) -> bool {
        match self.active.as_ref() {
            Some(active) if active.id == event.session => {}
            _ => {
                debug!(session = event.session, "ignoring event from released connection");
                return false;
            }
        }

        match event.event {
            TransportEvent::Connected => {
                apply(&self.shared_state, &self.metrics, DashboardState::on_connected).await;
                if let Some(active) = self.active.as_ref() {
                    match active.connection.subscribe(&active.topic) {
                        Ok(()) => info!(topic = %active.topic, "connected, subscribed"),
                        Err(err) => {
                            error!(topic = %active.topic, error = %err, "subscribe failed");
                            self.metrics.inc_transport_error();
                        }
                    }
                }
            }
            TransportEvent::Message { topic, payload } => {
                let now = now_unix();
                let result = apply(&self.shared_state, &self.metrics, |state| {
                    state.on_message(&payload, now)
                })
                .await;
                match result {
                    Ok(()) => {
                        self.metrics.inc_received();
                        debug!(topic = %topic, bytes = payload.len(), "snapshot received");
                    }
                    Err(err) => {
                        self.metrics.inc_dropped();
                        warn!(topic = %topic, error = %err, "dropping malformed snapshot");
                    }
                }
            }
            TransportEvent::Error(err) => {
                self.metrics.inc_transport_error();
                error!(error = %err, "broker connection error");
                apply(&self.shared_state, &self.metrics, DashboardState::on_error).await;
            }
            TransportEvent::Closed => {
                info!("broker connection closed");
                apply(&self.shared_state, &self.metrics, DashboardState::on_close).await;
            }
        }
        true
    }

    pub async fn run(
        mut self,
        endpoint: BrokerEndpoint,
        topic: String,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.start(&endpoint, &topic).await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown requested, stopping ingestion");
                    break;
                }
                Some(event) = self.next_event() => {
                    self.handle(event).await;
                }
            }
        }

        self.stop().await;
    }
}

async fn apply<R>(
    shared_state: &RwLock<DashboardState>,
    metrics: &Metrics,
    f: impl FnOnce(&mut DashboardState) -> R,
) -> R {
    let mut guard = shared_state.write().await;
    let out = f(&mut guard);
    metrics.update_from_state(&guard);
    out
}

pub fn client_id(prefix: &str) -> String {
    format!("{prefix}-{:08x}", rand::random::<u32>())
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
