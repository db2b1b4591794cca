//! Upstream forwarding.

use axum::body::Bytes;
use axum::http::StatusCode;
use std::future::Future;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};

/// Status and body returned by an upstream, relayed to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Sends a GET to an absolute upstream URI.
///
/// Implementations must give up after `timeout` and report
/// [`ProxyError::UpstreamTimeout`]; any other transport problem is
/// [`ProxyError::UpstreamFailure`].
pub trait Forwarder: Send + Sync + 'static {
    fn forward(
        &self,
        uri: &str,
        timeout: Duration,
    ) -> impl Future<Output = ProxyResult<UpstreamResponse>> + Send;
}

/// Forwarder backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new() -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProxyError::ConfigurationError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Forwarder for HttpForwarder {
    async fn forward(&self, uri: &str, timeout: Duration) -> ProxyResult<UpstreamResponse> {
        let response = self
            .client
            .get(uri)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(uri, e))?;

        let status = StatusCode::from_u16(response.status().as_u16()).map_err(|e| {
            ProxyError::UpstreamFailure {
                uri: uri.to_string(),
                reason: e.to_string(),
            }
        })?;
        let body = response.bytes().await.map_err(|e| transport_error(uri, e))?;

        Ok(UpstreamResponse { status, body })
    }
}

fn transport_error(uri: &str, err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout {
            uri: uri.to_string(),
        }
    } else {
        ProxyError::UpstreamFailure {
            uri: uri.to_string(),
            reason: err.to_string(),
        }
    }
}

/// `base + path`, plus `?query` when the request carried a non-empty query.
pub fn upstream_uri(base: &str, path: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}{}?{}", base, path, query),
        None => format!("{}{}", base, path),
    }
}
