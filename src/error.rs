use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub const ROUTE_NOT_CONFIGURED: &str =
    "Requested route not configured. Please check the configuration";
pub const METHOD_NOT_SUPPORTED: &str = "We are currently only handling GET traffic";
pub const TOO_MANY_REQUESTS: &str = "Too many requests. Try again later";
pub const UPSTREAM_FAILURE: &str = "Upstream service failed to respond";
pub const UPSTREAM_TIMEOUT: &str = "Upstream service timed out";
pub const INTERNAL_ERROR: &str = "Internal proxy error";

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("route for app `{0}` not configured")]
    RouteNotConfigured(String),

    #[error("method {0} not supported")]
    MethodNotSupported(Method),

    #[error("request on route `{route}` throttled by {rule} rule")]
    Throttled { route: String, rule: &'static str },

    #[error("upstream {uri} timed out")]
    UpstreamTimeout { uri: String },

    #[error("upstream {uri} failed: {reason}")]
    UpstreamFailure { uri: String, reason: String },

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RouteNotConfigured(_) => StatusCode::NOT_FOUND,
            ProxyError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ProxyError::ConfigurationError(_) | ProxyError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed client-facing body. Internal details stay in the logs.
    pub fn body(&self) -> String {
        match self {
            ProxyError::RouteNotConfigured(_) => ROUTE_NOT_CONFIGURED.to_string(),
            ProxyError::MethodNotSupported(_) => METHOD_NOT_SUPPORTED.to_string(),
            ProxyError::Throttled { .. } => TOO_MANY_REQUESTS.to_string(),
            ProxyError::UpstreamTimeout { .. } => UPSTREAM_TIMEOUT.to_string(),
            ProxyError::UpstreamFailure { .. } => UPSTREAM_FAILURE.to_string(),
            ProxyError::ValidationError(msg) => format!("Invalid request: {}", msg),
            ProxyError::ConfigurationError(_) | ProxyError::Io(_) => INTERNAL_ERROR.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}
