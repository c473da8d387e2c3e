//! Configuration loaded from `~/.config/courier/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_MAX_RETRIES;
use crate::error::CourierError;
use crate::queue::RequeuePolicy;
use crate::transport::TransportOptions;

/// Default capacity of the pending queue.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Default store key holding the persisted queue.
pub const DEFAULT_STORAGE_KEY: &str = "courier.queue";

/// Queue manager parameters (`[queue]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Backpressure limit: pending + in-flight operations.
    pub max_queue_size: usize,
    /// Retry ceiling for operations enqueued without one.
    pub default_max_retries: u32,
    pub storage_key: String,
    /// Deadline of one queue dispatch (the queue disables transport backoff).
    pub dispatch_timeout_ms: u64,
    /// Where a retryable failure is put back (`"tail"` or `"head"`).
    pub requeue: RequeuePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            default_max_retries: DEFAULT_MAX_RETRIES,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            dispatch_timeout_ms: 30_000,
            requeue: RequeuePolicy::Tail,
        }
    }
}

impl QueueConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// Retry transport parameters (`[transport]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Prefix for relative request URLs. Empty = absolute URLs only.
    pub base_url: String,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let defaults = TransportOptions::default();
        Self {
            base_url: String::new(),
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            timeout_ms: defaults.timeout.as_millis() as u64,
        }
    }
}

impl TransportConfig {
    pub fn options(&self) -> TransportOptions {
        TransportOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub queue: QueueConfig,
    pub transport: TransportConfig,
}

impl CourierConfig {
    /// Reject values that would make the queue unusable.
    pub fn validate(&self) -> Result<(), CourierError> {
        if self.queue.max_queue_size == 0 {
            return Err(CourierError::Config("queue.max_queue_size must be > 0".into()));
        }
        if self.queue.storage_key.trim().is_empty() {
            return Err(CourierError::Config("queue.storage_key must not be empty".into()));
        }
        if self.queue.dispatch_timeout_ms == 0 || self.transport.timeout_ms == 0 {
            return Err(CourierError::Config("timeouts must be > 0".into()));
        }
        Ok(())
    }

    pub fn from_toml_str(data: &str) -> Result<Self, CourierError> {
        let cfg: CourierConfig =
            toml::from_str(data).map_err(|e| CourierError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, CourierError> {
        let data = fs::read_to_string(path)
            .map_err(|e| CourierError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&data)
    }
}

pub fn config_path() -> Result<PathBuf, CourierError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("courier")
        .map_err(|e| CourierError::Config(e.to_string()))?;
    xdg_dirs
        .place_config_file("config.toml")
        .map_err(|e| CourierError::Config(e.to_string()))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CourierConfig, CourierError> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CourierConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)
            .map_err(|e| CourierError::Config(e.to_string()))?;
        fs::write(&path, toml)
            .map_err(|e| CourierError::Config(format!("write {}: {e}", path.display())))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    CourierConfig::load(&path)
}
