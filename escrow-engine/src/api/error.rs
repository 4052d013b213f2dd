//! Error to HTTP response mapping

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::dto::ErrorBody;
use crate::error::EscrowError;

#[derive(Debug)]
pub enum ApiError {
    /// Identity headers missing or unreadable
    Unauthenticated(String),
    Escrow(EscrowError),
}

impl ApiError {
    pub fn unauthenticated<S: Into<String>>(msg: S) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Escrow(err) => match err {
                EscrowError::NotFound(_) => StatusCode::NOT_FOUND,
                EscrowError::Unauthorized(_) => StatusCode::FORBIDDEN,
                EscrowError::InvalidTransition { .. }
                | EscrowError::InsufficientFunds { .. }
                | EscrowError::Validation(_) => StatusCode::BAD_REQUEST,
                EscrowError::Conflict(_) => StatusCode::CONFLICT,
                EscrowError::Config(_) | EscrowError::Database(_) | EscrowError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<EscrowError> for ApiError {
    fn from(err: EscrowError) -> Self {
        Self::Escrow(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Escrow(EscrowError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Escrow(EscrowError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Unauthenticated(message) => ErrorBody {
                error: "unauthenticated",
                message: message.clone(),
            },
            Self::Escrow(err) if status.is_server_error() => {
                error!("Request failed: {}", err);
                ErrorBody {
                    error: err.kind(),
                    message: "internal server error".to_string(),
                }
            }
            Self::Escrow(err) => ErrorBody {
                error: err.kind(),
                message: err.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
