use crate::state::DashboardState;
use prometheus::core::Collector;
use prometheus::{opts, Counter, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dashboard_broker_connected: Gauge,
    pub dashboard_history_len: Gauge,
    pub dashboard_messages_received_total: Counter,
    pub dashboard_messages_dropped_total: Counter,
    pub dashboard_transport_errors_total: Counter,
    pub dashboard_connect_attempts_total: Counter,
    pub dashboard_scrape_count_total: Counter,
    pub dashboard_last_message_timestamp_seconds: Gauge,
    pub dashboard_cpu_usage_percent: Gauge,
    pub dashboard_ram_usage_percent: Gauge,
    pub dashboard_disk_usage_percent: Gauge,
    pub dashboard_gpu_load_percent: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let dashboard_broker_connected = Gauge::with_opts(opts!(
            "dashboard_broker_connected",
            "1 while the broker connection is up and subscribed"
        ))?;
        let dashboard_history_len = Gauge::with_opts(opts!(
            "dashboard_history_len",
            "Number of snapshots currently retained in history"
        ))?;
        let dashboard_messages_received_total = Counter::with_opts(opts!(
            "dashboard_messages_received_total",
            "Snapshots parsed and accepted"
        ))?;
        let dashboard_messages_dropped_total = Counter::with_opts(opts!(
            "dashboard_messages_dropped_total",
            "Messages discarded because they did not parse"
        ))?;
        let dashboard_transport_errors_total = Counter::with_opts(opts!(
            "dashboard_transport_errors_total",
            "Errors reported by the broker transport"
        ))?;
        let dashboard_connect_attempts_total = Counter::with_opts(opts!(
            "dashboard_connect_attempts_total",
            "Connections opened towards the broker"
        ))?;
        let dashboard_scrape_count_total = Counter::with_opts(opts!(
            "dashboard_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let dashboard_last_message_timestamp_seconds = Gauge::with_opts(opts!(
            "dashboard_last_message_timestamp_seconds",
            "Unix time the last snapshot arrived"
        ))?;
        let dashboard_cpu_usage_percent = Gauge::with_opts(opts!(
            "dashboard_cpu_usage_percent",
            "CPU usage from the current snapshot"
        ))?;
        let dashboard_ram_usage_percent = Gauge::with_opts(opts!(
            "dashboard_ram_usage_percent",
            "RAM usage from the current snapshot"
        ))?;
        let dashboard_disk_usage_percent = Gauge::with_opts(opts!(
            "dashboard_disk_usage_percent",
            "Disk usage from the current snapshot"
        ))?;
        let dashboard_gpu_load_percent = Gauge::with_opts(opts!(
            "dashboard_gpu_load_percent",
            "Load of the first GPU in the current snapshot (0 without GPU)"
        ))?;

        register(&registry, &dashboard_broker_connected)?;
        register(&registry, &dashboard_history_len)?;
        register(&registry, &dashboard_messages_received_total)?;
        register(&registry, &dashboard_messages_dropped_total)?;
        register(&registry, &dashboard_transport_errors_total)?;
        register(&registry, &dashboard_connect_attempts_total)?;
        register(&registry, &dashboard_scrape_count_total)?;
        register(&registry, &dashboard_last_message_timestamp_seconds)?;
        register(&registry, &dashboard_cpu_usage_percent)?;
        register(&registry, &dashboard_ram_usage_percent)?;
        register(&registry, &dashboard_disk_usage_percent)?;
        register(&registry, &dashboard_gpu_load_percent)?;

        Ok(Arc::new(Self {
            registry,
            dashboard_broker_connected,
            dashboard_history_len,
            dashboard_messages_received_total,
            dashboard_messages_dropped_total,
            dashboard_transport_errors_total,
            dashboard_connect_attempts_total,
            dashboard_scrape_count_total,
            dashboard_last_message_timestamp_seconds,
            dashboard_cpu_usage_percent,
            dashboard_ram_usage_percent,
            dashboard_disk_usage_percent,
            dashboard_gpu_load_percent,
        }))
    }

    pub fn update_from_state(&self, state: &DashboardState) {
        self.dashboard_broker_connected
            .set(if state.connected() { 1.0 } else { 0.0 });
        self.dashboard_history_len.set(state.history.len() as f64);
        if let Some(ts) = state.last_message_at_unix {
            self.dashboard_last_message_timestamp_seconds.set(ts as f64);
        }

        let Some(current) = state.current.as_ref() else {
            return;
        };
        self.dashboard_cpu_usage_percent
            .set(current.cpu.usage_percent);
        self.dashboard_ram_usage_percent
            .set(current.ram.usage_percent);
        self.dashboard_disk_usage_percent
            .set(current.disk.usage_percent);
        self.dashboard_gpu_load_percent
            .set(current.primary_gpu().map(|g| g.load_percent).unwrap_or(0.0));
    }

    pub fn inc_received(&self) {
        self.dashboard_messages_received_total.inc();
    }

    pub fn inc_dropped(&self) {
        self.dashboard_messages_dropped_total.inc();
    }

    pub fn inc_transport_error(&self) {
        self.dashboard_transport_errors_total.inc();
    }

    pub fn inc_connect_attempt(&self) {
        self.dashboard_connect_attempts_total.inc();
    }

    pub fn inc_scrape_count(&self) {
        self.dashboard_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_json;

    #[test]
    fn state_is_reflected_in_gauges() {
        let metrics = Metrics::new().expect("metrics");
        let mut state = DashboardState::new();
        state.on_connected();
        state
            .on_message(snapshot_json("t", 45.0, 90.0, 70.0).as_bytes(), 1_700_000_000)
            .expect("valid");

        metrics.update_from_state(&state);

        assert_eq!(metrics.dashboard_broker_connected.get(), 1.0);
        assert_eq!(metrics.dashboard_history_len.get(), 1.0);
        assert_eq!(metrics.dashboard_cpu_usage_percent.get(), 45.0);
        assert_eq!(metrics.dashboard_ram_usage_percent.get(), 90.0);
        assert_eq!(metrics.dashboard_gpu_load_percent.get(), 0.0);
        assert_eq!(
            metrics.dashboard_last_message_timestamp_seconds.get(),
            1_700_000_000.0
        );

        state.on_close();
        metrics.update_from_state(&state);
        assert_eq!(metrics.dashboard_broker_connected.get(), 0.0);
    }

    #[test]
    fn encodes_text_format() {
        let metrics = Metrics::new().expect("metrics");
        metrics.inc_dropped();
        let text = String::from_utf8(metrics.encode_metrics().expect("encode")).expect("utf8");
        assert!(text.contains("dashboard_messages_dropped_total 1"));
    }
}
