use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::collections::HashMap;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};
use crate::throttle::ThrottleRule;

/// Upstream target and throttle rules for one route key.
#[derive(Debug)]
pub struct RouteConfig {
    key: String,
    upstream_base: String,
    rules: Vec<ThrottleRule>,
}

impl RouteConfig {
    pub fn new(key: impl Into<String>, upstream_base: impl Into<String>, rules: Vec<ThrottleRule>) -> Self {
        let upstream_base = upstream_base.into().trim_end_matches('/').to_string();
        Self {
            key: key.into(),
            upstream_base,
            rules,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn upstream_base(&self) -> &str {
        &self.upstream_base
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[ThrottleRule] {
        &self.rules
    }
}

/// Read-only mapping from route key to [`RouteConfig`].
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteConfig>,
}

impl RouteTable {
    /// Builds the table. If two configs share a key the later one wins and
    /// the earlier one is dropped (its rules stop their background work).
    pub fn new(configs: impl IntoIterator<Item = RouteConfig>) -> Self {
        let mut routes = HashMap::new();
        for config in configs {
            let key = config.key.clone();
            if routes.insert(key.clone(), config).is_some() {
                warn!(route = %key, "duplicate route key, keeping the last definition");
            }
        }
        Self { routes }
    }

    pub fn from_config(config: &Config, clock: &Clock) -> ProxyResult<Self> {
        let mut routes = Vec::with_capacity(config.routes.len());
        for spec in &config.routes {
            let rules = spec
                .throttle
                .iter()
                .map(|rule| ThrottleRule::from_spec(rule, config.prune_interval, clock.clone()))
                .collect::<ProxyResult<Vec<_>>>()?;
            info!(route = %spec.app, upstream = %spec.upstream, rules = rules.len(), "configured route");
            routes.push(RouteConfig::new(spec.app.clone(), spec.upstream.clone(), rules));
        }
        Ok(Self::new(routes))
    }

    pub fn resolve(&self, key: &str) -> ProxyResult<&RouteConfig> {
        self.routes
            .get(key)
            .ok_or_else(|| ProxyError::RouteNotConfigured(key.to_string()))
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.routes.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Stops every rule's background work.
    pub async fn shutdown(&self) {
        for route in self.routes.values() {
            for rule in route.rules() {
                rule.shutdown().await;
            }
        }
        info!(routes = self.routes.len(), "route table shut down");
    }
}

/// First path segment, percent-decoded: `/app1/test` -> `app1`,
/// `/app%31` -> `app1`, `/` -> ``.
pub fn extract_route_key(path: &str) -> Cow<'_, str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let segment = match rest.find('/') {
        Some(end) => &rest[..end],
        None => rest,
    };
    percent_decode_str(segment).decode_utf8_lossy()
}
