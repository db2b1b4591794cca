use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const UPDATE_APPLIED: &str = "Update successfully applied";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub routes: Vec<String>,
}

impl HealthResponse {
    pub fn healthy(routes: Vec<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            routes,
        }
    }
}
