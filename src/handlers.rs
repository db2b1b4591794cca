use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::warn;

use crate::error::ProxyError;
use crate::forward::Forwarder;
use crate::response::{HealthResponse, UPDATE_APPLIED};
use crate::router::RequestRouter;
use crate::updater::RuntimeConfigUpdater;
use crate::validation::{RequestValidator, UpdateWindowParams};

/// Shared application state
pub type SharedState<F> = Arc<AppState<F>>;

pub struct AppState<F> {
    pub router: RequestRouter<F>,
    pub updater: RuntimeConfigUpdater,
}

/// Proxy every request not claimed by an administrative endpoint
pub async fn proxy_request<F: Forwarder>(
    State(state): State<SharedState<F>>,
    method: Method,
    uri: Uri,
) -> impl IntoResponse {
    state.router.handle(&method, uri.path(), uri.query()).await
}

/// Change the time window of a route's throttle rules
pub async fn update_config<F: Forwarder>(
    State(state): State<SharedState<F>>,
    query: Result<Query<UpdateWindowParams>, QueryRejection>,
) -> Result<impl IntoResponse, ProxyError> {
    let params = RequestValidator::validate_update_params(query).inspect_err(|e| {
        warn!(error = %e, "rejected window update");
    })?;

    state.updater.update_window(&params.app, params.time)?;

    Ok((StatusCode::OK, UPDATE_APPLIED))
}

/// Health check endpoint
pub async fn health_check<F: Forwarder>(State(state): State<SharedState<F>>) -> impl IntoResponse {
    Json(HealthResponse::healthy(state.router.table().keys()))
}
