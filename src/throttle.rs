//! Throttle rules evaluated by the router before a request is forwarded.

use std::time::Duration;

use crate::clock::Clock;
use crate::config::ThrottleSpec;
use crate::error::ProxyResult;
use crate::time_window::TimeWindowThrottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject,
}

/// The closed set of throttle rules a route can carry.
#[derive(Debug)]
pub enum ThrottleRule {
    TimeWindow(TimeWindowThrottle),
}

impl ThrottleRule {
    /// Builds a rule from its configuration. Must run inside a Tokio runtime
    /// since some rules own background tasks.
    pub fn from_spec(spec: &ThrottleSpec, prune_interval: Duration, clock: Clock) -> ProxyResult<Self> {
        match spec {
            ThrottleSpec::TimeWindow { window_ms } => Ok(ThrottleRule::TimeWindow(
                TimeWindowThrottle::new(*window_ms, prune_interval, clock)?,
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThrottleRule::TimeWindow(_) => "time_window",
        }
    }

    pub fn decide(&self, path: &str, query: Option<&str>, now: u64) -> Decision {
        match self {
            ThrottleRule::TimeWindow(rule) => rule.decide(path, query, now),
        }
    }

    /// Rules whose window can be changed at runtime.
    pub fn as_time_window(&self) -> Option<&TimeWindowThrottle> {
        match self {
            ThrottleRule::TimeWindow(rule) => Some(rule),
        }
    }

    pub async fn shutdown(&self) {
        match self {
            ThrottleRule::TimeWindow(rule) => rule.shutdown().await,
        }
    }
}
