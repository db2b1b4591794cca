use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{ProxyError, ProxyResult};
use crate::forward::{upstream_uri, Forwarder, UpstreamResponse};
use crate::route_table::{extract_route_key, RouteTable};
use crate::throttle::Decision;

/// Resolves requests to routes, applies their throttle rules and forwards
/// admitted requests upstream.
pub struct RequestRouter<F> {
    table: Arc<RouteTable>,
    forwarder: F,
    clock: Clock,
    request_timeout: Duration,
}

impl<F: Forwarder> RequestRouter<F> {
    pub fn new(table: Arc<RouteTable>, forwarder: F, clock: Clock, request_timeout: Duration) -> Self {
        Self {
            table,
            forwarder,
            clock,
            request_timeout,
        }
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Always produces a response; failures become their fixed status and body.
    pub async fn handle(&self, method: &Method, path: &str, query: Option<&str>) -> (StatusCode, Bytes) {
        match self.dispatch(method, path, query).await {
            Ok(response) => (response.status, response.body),
            Err(err) => (err.status(), Bytes::from(err.body())),
        }
    }

    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
    ) -> ProxyResult<UpstreamResponse> {
        if method != Method::GET {
            warn!(%method, path, "only GET traffic is proxied");
            return Err(ProxyError::MethodNotSupported(method.clone()));
        }

        let route_key = extract_route_key(path);
        let key = &*route_key;
        let route = match self.table.resolve(key) {
            Ok(route) => route,
            Err(err) => {
                warn!(route = key, "route not configured");
                return Err(err);
            }
        };

        let now = self.clock.now_millis();
        for rule in route.rules() {
            if rule.decide(path, query, now) == Decision::Reject {
                info!(route = key, rule = rule.name(), path, "request throttled");
                return Err(ProxyError::Throttled {
                    route: key.to_string(),
                    rule: rule.name(),
                });
            }
        }

        let uri = upstream_uri(route.upstream_base(), path, query);
        match self.forwarder.forward(&uri, self.request_timeout).await {
            Ok(response) => {
                debug!(route = key, upstream = %uri, status = %response.status, "forwarded request");
                Ok(response)
            }
            Err(err) => {
                error!(route = key, upstream = %uri, error = %err, "forwarding failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::route_table::RouteConfig;
    use crate::throttle::ThrottleRule;
    use crate::time_window::{TimeWindowThrottle, DEFAULT_PRUNE_INTERVAL};
    use std::io;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    /// Records forwarded URIs and answers with a canned response or error.
    #[derive(Clone, Default)]
    struct StubForwarder {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl StubForwarder {
        fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Forwarder for StubForwarder {
        async fn forward(&self, uri: &str, _timeout: Duration) -> ProxyResult<UpstreamResponse> {
            self.calls.lock().unwrap().push(uri.to_string());
            if self.fail {
                return Err(ProxyError::UpstreamFailure {
                    uri: uri.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(UpstreamResponse {
                status: StatusCode::CREATED,
                body: Bytes::from_static(b"upstream body"),
            })
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn window_rule(window_ms: u64, clock: &Clock) -> ThrottleRule {
        ThrottleRule::TimeWindow(
            TimeWindowThrottle::new(window_ms, DEFAULT_PRUNE_INTERVAL, clock.clone()).unwrap(),
        )
    }

    fn router(rules: Vec<ThrottleRule>, forwarder: StubForwarder, clock: Clock) -> RequestRouter<StubForwarder> {
        let table = RouteTable::new(vec![RouteConfig::new("app1", "http://localhost:9000", rules)]);
        RequestRouter::new(Arc::new(table), forwarder, clock, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_non_get_rejected_without_forwarding() {
        let forwarder = StubForwarder::default();
        let router = router(Vec::new(), forwarder.clone(), Clock::manual(0));

        let (status, body) = router.handle(&Method::POST, "/app1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, crate::error::METHOD_NOT_SUPPORTED);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route_logs_key() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let router = router(Vec::new(), StubForwarder::default(), Clock::manual(0));
        let (status, body) = router.handle(&Method::GET, "/app9/test", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, crate::error::ROUTE_NOT_CONFIGURED);
        let output = logs.contents();
        assert!(output.contains("route not configured"));
        assert!(output.contains("app9"));
    }

    #[tokio::test]
    async fn test_forwards_path_and_query_unchanged() {
        let forwarder = StubForwarder::default();
        let router = router(Vec::new(), forwarder.clone(), Clock::manual(0));

        let (status, body) = router
            .handle(&Method::GET, "/app1/test", Some("z=200&q=100"))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, "upstream body");
        assert_eq!(
            forwarder.calls(),
            vec!["http://localhost:9000/app1/test?z=200&q=100".to_string()]
        );
    }

    #[tokio::test]
    async fn test_encoded_route_key_resolves_and_forwards_raw_path() {
        let forwarder = StubForwarder::default();
        let router = router(Vec::new(), forwarder.clone(), Clock::manual(0));

        let (status, _) = router.handle(&Method::GET, "/app%31/a%20b", Some("q=%41")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            forwarder.calls(),
            vec!["http://localhost:9000/app%31/a%20b?q=%41".to_string()]
        );
    }

    #[tokio::test]
    async fn test_encoded_and_plain_requests_share_a_window() {
        let clock = Clock::manual(0);
        let forwarder = StubForwarder::default();
        let router = router(vec![window_rule(1000, &clock)], forwarder.clone(), clock.clone());

        assert_eq!(
            router.handle(&Method::GET, "/app1/test", Some("q=A")).await.0,
            StatusCode::CREATED
        );
        clock.set(10);
        assert_eq!(
            router.handle(&Method::GET, "/app%31/t%65st", Some("q=%41")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(forwarder.calls().len(), 1);
        router.table().shutdown().await;
    }

    #[tokio::test]
    async fn test_first_rejecting_rule_short_circuits() {
        let clock = Clock::manual(0);
        let forwarder = StubForwarder::default();
        let router = router(
            vec![window_rule(1000, &clock), window_rule(10, &clock)],
            forwarder.clone(),
            clock.clone(),
        );

        assert_eq!(router.handle(&Method::GET, "/app1", None).await.0, StatusCode::CREATED);

        clock.set(100);
        assert_eq!(
            router.handle(&Method::GET, "/app1", None).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );

        // the second rule's 10ms window had lapsed, so evaluating it would
        // have moved its entry to 100
        let route = router.table().resolve("app1").unwrap();
        let second = route.rules()[1].as_time_window().unwrap();
        assert_eq!(
            second.cache().last_admitted(&Fingerprint::compute("/app1", None)),
            Some(0)
        );
        assert_eq!(forwarder.calls().len(), 1);
        router.table().shutdown().await;
    }

    #[tokio::test]
    async fn test_upstream_failure_produces_bad_gateway() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let router = router(Vec::new(), StubForwarder::failing(), Clock::manual(0));

        let (status, body) = router.handle(&Method::GET, "/app1", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, crate::error::UPSTREAM_FAILURE);

        let output = logs.contents();
        assert!(output.contains("ERROR"));
        assert!(output.contains("forwarding failed"));
        assert!(output.contains("route=\"app1\""));
        assert!(output.contains("upstream=http://localhost:9000/app1"));
    }
}
