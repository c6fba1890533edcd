use crate::classify::{classify, is_present, Tier};
use crate::snapshot::{SystemMetrics, CPU_TEMPERATURE_LABEL, SSD_TEMPERATURE_LABEL};
use crate::state::{DashboardState, Phase};
use serde::Serialize;
use std::time::UNIX_EPOCH;

pub const RECENT_ROWS: usize = 5;
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accent {
    Blue,
    Purple,
    Orange,
    Pink,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub title: &'static str,
    pub value: Option<f64>,
    pub unit: &'static str,
    pub details: Option<String>,
    pub temperature: Option<f64>,
    pub tier: Tier,
    pub accent: Accent,
}

impl MetricCard {
    pub fn new(
        title: &'static str,
        value: Option<f64>,
        details: Option<String>,
        temperature: Option<f64>,
        accent: Accent,
    ) -> Self {
        Self {
            title,
            value,
            unit: "%",
            details,
            temperature,
            tier: classify(value),
            accent,
        }
    }

    pub fn value_label(&self) -> String {
        match self.value {
            Some(v) => format!("{v}{}", self.unit),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn temperature_label(&self) -> Option<String> {
        self.temperature
            .filter(|t| is_present(*t))
            .map(|t| format!("Temperature: {t:.1}°C"))
    }

    // Not clamped to 0..100.
    pub fn bar_percent(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    pub value: f64,
    pub tier: Tier,
}

impl Cell {
    fn new(value: f64) -> Self {
        Self {
            value,
            tier: classify(Some(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub time: String,
    pub cpu: Cell,
    pub ram: Cell,
    pub disk: Cell,
    pub gpu: Option<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTable {
    pub show_gpu: bool,
    pub rows: Vec<HistoryRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsView {
    pub platform: String,
    pub connected: bool,
    pub cards: Vec<MetricCard>,
    pub last_updated: String,
    pub recent: Option<RecentTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardView {
    Connecting,
    WaitingForData,
    Metrics(MetricsView),
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiState {
    pub phase: Phase,
    pub connected: bool,
    pub history_len: usize,
    pub last_message_at_unix: Option<i64>,
    pub view: DashboardView,
}

impl From<&DashboardState> for ApiState {
    fn from(value: &DashboardState) -> Self {
        Self {
            phase: value.phase,
            connected: value.connected(),
            history_len: value.history.len(),
            last_message_at_unix: value.last_message_at_unix,
            view: compose(value),
        }
    }
}

pub fn compose(state: &DashboardState) -> DashboardView {
    let connected = state.connected();
    let Some(current) = state.current.as_deref() else {
        return if connected {
            DashboardView::WaitingForData
        } else {
            DashboardView::Connecting
        };
    };

    let recent = (state.history.len() > 1).then(|| {
        let show_gpu = state
            .history
            .newest()
            .and_then(|s| s.primary_gpu())
            .is_some();
        RecentTable {
            show_gpu,
            rows: state
                .history
                .iter()
                .take(RECENT_ROWS)
                .map(|s| history_row(s.as_ref()))
                .collect(),
        }
    });

    DashboardView::Metrics(MetricsView {
        platform: current.platform.clone(),
        connected,
        cards: metric_cards(current),
        last_updated: format_timestamp(&current.timestamp),
        recent,
    })
}

pub fn metric_cards(metrics: &SystemMetrics) -> Vec<MetricCard> {
    let cpu = &metrics.cpu;
    let gpu = metrics.primary_gpu();
    vec![
        MetricCard::new(
            "CPU",
            Some(cpu.usage_percent),
            Some(format!(
                "{}P / {}L cores",
                count_label(cpu.cores_physical),
                count_label(cpu.cores_logical)
            )),
            metrics.temperature_for(CPU_TEMPERATURE_LABEL),
            Accent::Blue,
        ),
        MetricCard::new(
            "RAM",
            Some(metrics.ram.usage_percent),
            Some(format!(
                "{:.1} / {:.1} GB",
                metrics.ram.used_gb, metrics.ram.total_gb
            )),
            None,
            Accent::Purple,
        ),
        MetricCard::new(
            "Disk",
            Some(metrics.disk.usage_percent),
            Some(format!(
                "{:.1} / {:.1} GB",
                metrics.disk.used_gb, metrics.disk.total_gb
            )),
            metrics.temperature_for(SSD_TEMPERATURE_LABEL),
            Accent::Orange,
        ),
        MetricCard::new(
            "GPU",
            gpu.map(|g| g.load_percent),
            gpu.map(|g| format!("Memory: {}%", g.memory_usage_percent)),
            gpu.and_then(|g| g.temperature_c),
            Accent::Pink,
        ),
    ]
}

fn history_row(metrics: &SystemMetrics) -> HistoryRow {
    HistoryRow {
        time: format_time_of_day(&metrics.timestamp),
        cpu: Cell::new(metrics.cpu.usage_percent),
        ram: Cell::new(metrics.ram.usage_percent),
        disk: Cell::new(metrics.disk.usage_percent),
        gpu: metrics.primary_gpu().map(|g| Cell::new(g.load_percent)),
    }
}

fn count_label(count: Option<u32>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
}

pub fn format_timestamp(raw: &str) -> String {
    normalized_timestamp(raw).unwrap_or_else(|| raw.to_string())
}

pub fn format_time_of_day(raw: &str) -> String {
    match normalized_timestamp(raw) {
        Some(formatted) => formatted
            .split_once(' ')
            .map(|(_, time)| time.to_string())
            .unwrap_or(formatted),
        None => raw.to_string(),
    }
}

fn normalized_timestamp(raw: &str) -> Option<String> {
    let ts = humantime::parse_rfc3339_weak(raw.trim()).ok()?;
    if ts < UNIX_EPOCH {
        return None;
    }
    Some(
        humantime::format_rfc3339_seconds(ts)
            .to_string()
            .trim_end_matches('Z')
            .replace('T', " "),
    )
}
