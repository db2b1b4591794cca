use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::{Config, RouteSpec, ThrottleSpec};
use crate::error::{ProxyError, ProxyResult};

static UPSTREAM_BASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9.\-]+)(:[0-9]{1,5})?/?$")
        .expect("upstream base pattern is valid")
});

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ProxyResult<()> {
        if config.worker_threads == 0 {
            return Err(invalid("Worker thread count must be greater than 0"));
        }
        Self::validate_duration("request_timeout", config.request_timeout)?;
        Self::validate_duration("prune_interval", config.prune_interval)?;
        Self::validate_routes(&config.routes)
    }

    pub fn validate_routes(routes: &[RouteSpec]) -> ProxyResult<()> {
        if routes.is_empty() {
            return Err(invalid("At least one route must be configured"));
        }

        let mut seen = HashSet::new();
        for route in routes {
            Self::validate_route_key(&route.app)?;
            Self::validate_upstream_base(&route.upstream)?;
            for rule in &route.throttle {
                Self::validate_throttle(rule)?;
            }
            if !seen.insert(route.app.as_str()) {
                return Err(invalid(&format!("Route '{}' is configured more than once", route.app)));
            }
        }
        Ok(())
    }

    /// Route keys are matched against the first path segment verbatim.
    pub fn validate_route_key(key: &str) -> ProxyResult<()> {
        if key.is_empty() {
            return Err(invalid("Route key cannot be empty"));
        }
        if key.contains('/') || key.contains('?') {
            return Err(invalid(&format!(
                "Route key '{}' must be a single path segment",
                key
            )));
        }
        Ok(())
    }

    pub fn validate_upstream_base(url: &str) -> ProxyResult<()> {
        if !UPSTREAM_BASE.is_match(url) {
            return Err(invalid(&format!(
                "Upstream '{}' must be scheme://host[:port] with no path",
                url
            )));
        }
        Ok(())
    }

    pub fn validate_throttle(rule: &ThrottleSpec) -> ProxyResult<()> {
        match rule {
            ThrottleSpec::TimeWindow { window_ms: 0 } => {
                Err(invalid("Time window must be greater than 0 ms"))
            }
            ThrottleSpec::TimeWindow { .. } => Ok(()),
        }
    }

    fn validate_duration(name: &str, value: Duration) -> ProxyResult<()> {
        if value.is_zero() {
            return Err(invalid(&format!("{} must be greater than 0", name)));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ProxyError {
    ProxyError::ConfigurationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(app: &str, upstream: &str) -> RouteSpec {
        RouteSpec {
            app: app.to_string(),
            upstream: upstream.to_string(),
            throttle: vec![ThrottleSpec::TimeWindow { window_ms: 5000 }],
        }
    }

    #[test]
    fn test_valid_upstream_base() {
        assert!(ConfigValidator::validate_upstream_base("http://localhost:9000").is_ok());
        assert!(ConfigValidator::validate_upstream_base("https://api.example.com").is_ok());
        assert!(ConfigValidator::validate_upstream_base("http://127.0.0.1:9001/").is_ok());
        assert!(ConfigValidator::validate_upstream_base("http://[::1]:9000").is_ok());
    }

    #[test]
    fn test_invalid_upstream_base() {
        assert!(ConfigValidator::validate_upstream_base("").is_err());
        assert!(ConfigValidator::validate_upstream_base("localhost:9000").is_err());
        assert!(ConfigValidator::validate_upstream_base("ftp://localhost:9000").is_err());
        assert!(ConfigValidator::validate_upstream_base("http://localhost:9000/api").is_err());
    }

    #[test]
    fn test_route_key() {
        assert!(ConfigValidator::validate_route_key("app1").is_ok());
        assert!(ConfigValidator::validate_route_key("").is_err());
        assert!(ConfigValidator::validate_route_key("app/1").is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(ConfigValidator::validate_throttle(&ThrottleSpec::TimeWindow { window_ms: 0 }).is_err());
        assert!(ConfigValidator::validate_throttle(&ThrottleSpec::TimeWindow { window_ms: 1 }).is_ok());
    }

    #[test]
    fn test_duplicate_routes_rejected() {
        let routes = vec![route("app1", "http://a:1"), route("app1", "http://b:2")];
        assert!(ConfigValidator::validate_routes(&routes).is_err());
    }

    #[test]
    fn test_empty_routes_rejected() {
        assert!(ConfigValidator::validate_routes(&[]).is_err());
    }

    #[test]
    fn test_valid_config() {
        let config = Config::from_json(
            r#"{ "routes": [
                { "app": "app1", "upstream": "http://localhost:9000",
                  "throttle": [ { "type": "time_window", "window_ms": 5000 } ] },
                { "app": "app2", "upstream": "http://localhost:9001" }
            ] }"#,
        )
        .unwrap();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config::from_json(
            r#"{ "request_timeout": "0s",
                 "routes": [ { "app": "app1", "upstream": "http://localhost:9000" } ] }"#,
        )
        .unwrap();
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
