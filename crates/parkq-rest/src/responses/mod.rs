//! API response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parkq_core::{ErrorResponse, ParkqError};
use parkq_jobs::LeaseError;
use serde::Serialize;
use tracing::error;

/// Application error type for Axum.
#[derive(Debug)]
pub struct AppError(pub ParkqError);

impl From<ParkqError> for AppError {
    fn from(err: ParkqError) -> Self {
        Self(err)
    }
}

impl From<LeaseError> for AppError {
    fn from(err: LeaseError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() && !self.0.is_retriable() {
            error!(error = %self.0, "Request failed");
        }

        let body = Json(ErrorResponse::from_error(&self.0));
        (status, body).into_response()
    }
}

/// Result type for Axum handlers.
pub type ApiResult<T> = Result<Json<T>, AppError>;

/// Helper to create a success response.
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(data))
}
