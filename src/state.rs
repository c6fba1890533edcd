use crate::snapshot::{PayloadError, SystemMetrics};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Receiving,
}

// Newest first, by arrival.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<Arc<SystemMetrics>>,
}

impl History {
    pub fn push(&mut self, snapshot: Arc<SystemMetrics>) {
        self.entries.push_front(snapshot);
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn newest(&self) -> Option<&Arc<SystemMetrics>> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SystemMetrics>> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub phase: Phase,
    pub current: Option<Arc<SystemMetrics>>,
    pub history: History,
    pub last_message_at_unix: Option<i64>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(&self) -> bool {
        matches!(self.phase, Phase::Connected | Phase::Receiving)
    }

    pub fn on_connecting(&mut self) {
        self.phase = Phase::Connecting;
    }

    pub fn on_connected(&mut self) {
        self.phase = Phase::Connected;
    }

    pub fn on_message(&mut self, payload: &[u8], now_unix: i64) -> Result<(), PayloadError> {
        let snapshot = Arc::new(SystemMetrics::from_payload(payload)?);
        self.history.push(snapshot.clone());
        self.current = Some(snapshot);
        self.last_message_at_unix = Some(now_unix);
        self.phase = Phase::Receiving;
        Ok(())
    }

    pub fn on_error(&mut self) {
        self.phase = Phase::Disconnected;
    }

    pub fn on_close(&mut self) {
        self.phase = Phase::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_json;

    fn payload(ts: &str, cpu: f64) -> Vec<u8> {
        snapshot_json(ts, cpu, 50.0, 50.0).into_bytes()
    }

    #[test]
    fn lifecycle_transitions() {
        let mut state = DashboardState::new();
        assert_eq!(state.phase, Phase::Disconnected);
        assert!(!state.connected());

        state.on_connecting();
        assert_eq!(state.phase, Phase::Connecting);
        assert!(!state.connected());

        state.on_connected();
        assert!(state.connected());
        assert!(state.current.is_none());

        state.on_message(&payload("a", 10.0), 100).expect("valid");
        assert_eq!(state.phase, Phase::Receiving);
        assert_eq!(state.last_message_at_unix, Some(100));

        state.on_error();
        assert!(!state.connected());
        assert!(state.current.is_some());

        state.on_connected();
        state.on_close();
        assert_eq!(state.phase, Phase::Disconnected);
    }

    #[test]
    fn history_keeps_last_ten_newest_first() {
        let mut state = DashboardState::new();
        state.on_connected();
        for i in 0..25 {
            state
                .on_message(&payload(&format!("t{i}"), i as f64), i)
                .expect("valid");
            assert!(state.history.len() <= HISTORY_LIMIT);
        }

        let stamps: Vec<&str> = state.history.iter().map(|s| s.timestamp.as_str()).collect();
        let expected: Vec<String> = (15..25).rev().map(|i| format!("t{i}")).collect();
        assert_eq!(stamps, expected);
        assert_eq!(
            state.current.as_ref().map(|s| s.timestamp.as_str()),
            Some("t24")
        );
    }

    #[test]
    fn arrival_order_wins_over_timestamps() {
        let mut state = DashboardState::new();
        state
            .on_message(&payload("2025-01-01T12:00:10", 1.0), 1)
            .expect("valid");
        state
            .on_message(&payload("2025-01-01T12:00:00", 2.0), 2)
            .expect("valid");
        state
            .on_message(&payload("2025-01-01T12:00:00", 2.0), 3)
            .expect("valid");

        let cpu: Vec<f64> = state.history.iter().map(|s| s.cpu.usage_percent).collect();
        assert_eq!(cpu, vec![2.0, 2.0, 1.0]);
    }

    #[test]
    fn malformed_payload_changes_nothing() {
        let mut state = DashboardState::new();
        state.on_connected();
        state.on_message(&payload("a", 10.0), 5).expect("valid");
        let before = state.current.clone();

        assert!(state.on_message(b"{\"cpu\": 1}", 6).is_err());
        assert!(state.on_message(b"", 7).is_err());

        assert_eq!(state.history.len(), 1);
        assert!(Arc::ptr_eq(
            state.current.as_ref().expect("current"),
            before.as_ref().expect("before")
        ));
        assert_eq!(state.last_message_at_unix, Some(5));
        assert_eq!(state.phase, Phase::Receiving);
    }
}
