use axum::extract::{rejection::QueryRejection, Query};
use serde::Deserialize;
use validator::Validate;

use crate::error::{ProxyError, ProxyResult};

/// Query parameters of `POST /config`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct UpdateWindowParams {
    #[validate(length(min = 1, message = "app cannot be empty"))]
    pub app: String,
    #[validate(range(min = 1, message = "time must be a positive number of milliseconds"))]
    pub time: u64,
}

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Checks the decoded `app=<route>&time=<millis>` parameters. Extraction
    /// failures (missing or non-numeric fields) are reported the same way as
    /// validation failures.
    pub fn validate_update_params(
        query: Result<Query<UpdateWindowParams>, QueryRejection>,
    ) -> ProxyResult<UpdateWindowParams> {
        let Query(params) = query.map_err(|rejection| ProxyError::ValidationError(rejection.body_text()))?;
        params
            .validate()
            .map_err(|e| ProxyError::ValidationError(e.to_string()))?;
        Ok(params)
    }
}
