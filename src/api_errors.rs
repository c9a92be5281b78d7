use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::WatchError;
use crate::input_validator::FieldError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request body failed validation ({} errors)", detail.len())]
    Unprocessable { detail: Vec<FieldError>, body: Value },
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn unprocessable(detail: Vec<FieldError>, body: Value) -> Self {
        Self::Unprocessable { detail, body }
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

#[derive(Serialize)]
struct ValidationBody {
    detail: Vec<FieldError>,
    body: Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unprocessable { detail, body } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationBody { detail, body }),
            )
                .into_response(),
            AppError::BadGateway(s) => {
                (StatusCode::BAD_GATEWAY, Json(ErrBody { error: s })).into_response()
            }
            AppError::Internal(s) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrBody { error: s })).into_response()
            }
        }
    }
}

impl From<WatchError> for AppError {
    fn from(err: WatchError) -> Self {
        match err {
            WatchError::Advice { message } => {
                AppError::BadGateway(format!("Advice generation failed: {message}"))
            }
            WatchError::Database { operation, source } => {
                AppError::Internal(format!("Database {operation} failed: {source}"))
            }
            WatchError::MutexPoisoned { resource } => {
                AppError::Internal(format!("Mutex for {resource} poisoned"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
