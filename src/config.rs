use crate::transport::{BrokerEndpoint, EndpointError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_BROKER: &str = "MQTT_BROKER";
pub const ENV_TOPIC: &str = "MQTT_TOPIC";
pub const ENV_LISTEN: &str = "DASHBOARD_LISTEN";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_url")]
    pub url: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            refresh_secs: default_refresh_secs(),
            broker: BrokerConfig::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            topic: default_topic(),
            client_id_prefix: default_client_id_prefix(),
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid broker.url: {0}")]
    Broker(#[from] EndpointError),
    #[error("config validation failed: {0}")]
    Validation(String),
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let path_display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BROKER) {
            self.broker.url = url;
        }
        if let Some(topic) = non_empty(ENV_TOPIC) {
            self.broker.topic = topic;
        }
        if let Some(listen) = non_empty(ENV_LISTEN) {
            self.listen = listen;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port socket address".to_string(),
            ));
        }
        if self.refresh_secs < 1 {
            return Err(ConfigError::Validation(
                "refresh_secs must be >= 1".to_string(),
            ));
        }

        validate_broker(&self.broker)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

impl BrokerConfig {
    pub fn endpoint(&self) -> Result<BrokerEndpoint, EndpointError> {
        self.url.parse()
    }
}

fn validate_broker(cfg: &BrokerConfig) -> Result<(), ConfigError> {
    cfg.endpoint()?;
    if cfg.topic.trim().is_empty() {
        return Err(ConfigError::Validation(
            "broker.topic must not be empty".to_string(),
        ));
    }
    if cfg.client_id_prefix.is_empty() || cfg.client_id_prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "broker.client_id_prefix must be non-empty and contain no whitespace".to_string(),
        ));
    }
    if cfg.keep_alive_secs < 5 || cfg.keep_alive_secs > u64::from(u16::MAX) {
        return Err(ConfigError::Validation(
            "broker.keep_alive_secs must be in 5..=65535".to_string(),
        ));
    }
    if cfg.reconnect_delay_secs < 1 {
        return Err(ConfigError::Validation(
            "broker.reconnect_delay_secs must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

const fn default_refresh_secs() -> u64 {
    2
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_topic() -> String {
    "protexai/sensors".to_string()
}

fn default_client_id_prefix() -> String {
    "ui-consumer".to_string()
}

const fn default_keep_alive_secs() -> u64 {
    60
}

const fn default_reconnect_delay_secs() -> u64 {
    3
}
