use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};
use crate::time_window::DEFAULT_PRUNE_INTERVAL;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Size of the request worker pool
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Timeout for each upstream call
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Period of the throttle cache pruning pass
    #[serde(default = "default_prune_interval", with = "humantime_serde")]
    pub prune_interval: Duration,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub routes: Vec<RouteSpec>,
}

/// One proxied application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteSpec {
    /// Route key, the first path segment
    pub app: String,
    /// Scheme, host and port of the upstream service
    pub upstream: String,
    #[serde(default)]
    pub throttle: Vec<ThrottleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThrottleSpec {
    TimeWindow { window_ms: u64 },
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_prune_interval() -> Duration {
    DEFAULT_PRUNE_INTERVAL
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> ProxyResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> ProxyResult<Self> {
        serde_json::from_str(raw).map_err(|e| ProxyError::ConfigurationError(e.to_string()))
    }
}
