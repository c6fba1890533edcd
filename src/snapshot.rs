use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CPU_TEMPERATURE_LABEL: &str = "CPU";
pub const SSD_TEMPERATURE_LABEL: &str = "SSD";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload does not match the snapshot shape: {0}")]
    Json(#[from] serde_json::Error),
}

// Values are taken as given; used_gb <= total_gb is not checked.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemMetrics {
    pub timestamp: String,
    pub platform: String,
    pub cpu: CpuMetrics,
    #[serde(default)]
    pub gpu: Option<Vec<GpuMetrics>>,
    pub ram: RamMetrics,
    pub disk: DiskMetrics,
    #[serde(default)]
    pub temperature: Option<Vec<TemperatureSensor>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CpuMetrics {
    pub usage_percent: f64,
    #[serde(default)]
    pub cores_physical: Option<u32>,
    #[serde(default)]
    pub cores_logical: Option<u32>,
    #[serde(default)]
    pub frequency_mhz: Option<f64>,
    #[serde(default)]
    pub usage_per_core: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GpuMetrics {
    #[serde(default)]
    pub name: Option<String>,
    pub load_percent: f64,
    pub memory_usage_percent: f64,
    #[serde(default)]
    pub memory_used_gb: Option<f64>,
    #[serde(default)]
    pub memory_total_gb: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RamMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub usage_percent: f64,
    #[serde(default)]
    pub available_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DiskMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub usage_percent: f64,
    #[serde(default)]
    pub free_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemperatureSensor {
    pub label: String,
    // The sensor producer publishes `current_c`.
    #[serde(alias = "current_c")]
    pub temperature_c: f64,
    #[serde(default)]
    pub high_c: Option<f64>,
    #[serde(default)]
    pub critical_c: Option<f64>,
}

impl SystemMetrics {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text)?)
    }

    /// Exact, case-sensitive label lookup. When a label repeats, the last
    /// entry wins.
    pub fn temperature_for(&self, label: &str) -> Option<f64> {
        self.temperature
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|t| t.label == label)
            .map(|t| t.temperature_c)
            .last()
    }

    pub fn primary_gpu(&self) -> Option<&GpuMetrics> {
        self.gpu.as_deref().and_then(|gpus| gpus.first())
    }
}
