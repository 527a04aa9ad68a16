//! API handlers module

pub mod ask;
pub mod documents;
pub mod health;
pub mod summarize;
pub mod upload;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use regula_common::errors::{AppError, Result};
use validator::Validate;

/// Unwrap a JSON body, turning extractor rejections and failed field
/// validation into `InvalidRequest` errors
pub(crate) fn parse_body<T: Validate>(
    payload: std::result::Result<Json<T>, JsonRejection>,
    limit: usize,
) -> Result<T> {
    let Json(body) =
        payload.map_err(|rejection| body_error(rejection.status(), rejection.body_text(), limit))?;

    body.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    Ok(body)
}

/// Map a body extractor failure; an exceeded body limit keeps its own status
pub(crate) fn body_error(status: StatusCode, message: String, limit: usize) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::InvalidFormat { message }
    }
}
