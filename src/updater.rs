use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ProxyError, ProxyResult};
use crate::route_table::RouteTable;

/// Applies administrative parameter changes to live throttle rules.
#[derive(Debug, Clone)]
pub struct RuntimeConfigUpdater {
    table: Arc<RouteTable>,
}

impl RuntimeConfigUpdater {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Sets the window of every time-window rule on `route_key` and returns
    /// how many rules were updated. Zero means the route exists but carries
    /// no adjustable rule.
    pub fn update_window(&self, route_key: &str, window_ms: u64) -> ProxyResult<usize> {
        if window_ms == 0 {
            return Err(ProxyError::ValidationError(
                "time must be a positive number of milliseconds".to_string(),
            ));
        }

        let route = self.table.resolve(route_key).inspect_err(|_| {
            warn!(route = route_key, "window update for unconfigured route");
        })?;

        let mut updated = 0;
        for rule in route.rules().iter().filter_map(|rule| rule.as_time_window()) {
            rule.set_window(window_ms);
            updated += 1;
        }

        if updated == 0 {
            warn!(route = route_key, "route has no time window rule to update");
        } else {
            info!(route = route_key, window_ms, rules = updated, "applied window update");
        }
        Ok(updated)
    }
}
