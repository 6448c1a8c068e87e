/**
 * Backend Error Types
 *
 * The HTTP-facing error. Domain failures arrive as `BoardError` or
 * `RealtimeError`; request problems (bad JSON, missing token) are added
 * here. Every variant knows its status code, error code and whether the
 * client may retry.
 *
 * # Status Mapping
 *
 * - `NOT_FOUND`, `UNKNOWN_CONNECTION` - 404
 * - `CONTENDED` - 409, retriable
 * - `VALIDATION_ERROR` - 400
 * - `UNAUTHORIZED` - 401
 * - `PERSISTENCE_FAILURE`, `INTERNAL` - 500
 */

use crate::backend::board::BoardError;
use crate::backend::realtime::RealtimeError;
use crate::shared::model::ErrorCode;
use crate::shared::SharedError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error with an explicit status
    #[error("Handler error: {message}")]
    HandlerError {
        status: StatusCode,
        code: ErrorCode,
        message: String,
    },

    /// Missing or invalid bearer token
    #[error("Authentication required")]
    Unauthorized,

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Body was not valid JSON for the endpoint
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

impl BackendError {
    pub fn handler(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BackendError::HandlerError { code, .. } => *code,
            BackendError::Unauthorized => ErrorCode::Unauthorized,
            BackendError::Board(e) => e.code(),
            BackendError::Realtime(RealtimeError::UnknownConnection { .. }) => {
                ErrorCode::UnknownConnection
            }
            BackendError::Realtime(RealtimeError::NotInRoom { .. }) => ErrorCode::ValidationError,
            BackendError::Realtime(RealtimeError::Board(e)) => e.code(),
            BackendError::Realtime(RealtimeError::Presence(_)) => ErrorCode::Internal,
            BackendError::SharedError(_) | BackendError::InvalidBody(_) => {
                ErrorCode::ValidationError
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if let BackendError::HandlerError { status, .. } = self {
            return *status;
        }
        match self.code() {
            ErrorCode::NotFound | ErrorCode::UnknownConnection => StatusCode::NOT_FOUND,
            ErrorCode::Contended => StatusCode::CONFLICT,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::PersistenceFailure | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn retriable(&self) -> bool {
        match self {
            BackendError::Board(e) | BackendError::Realtime(RealtimeError::Board(e)) => {
                e.retriable()
            }
            _ => false,
        }
    }

    /// Message safe to send to the client
    pub fn message(&self) -> String {
        match self {
            BackendError::HandlerError { message, .. } => message.clone(),
            BackendError::Board(e) | BackendError::Realtime(RealtimeError::Board(e)) => {
                e.public_message()
            }
            BackendError::Realtime(RealtimeError::Presence(_)) => {
                "Presence update failed".to_string()
            }
            BackendError::SharedError(SharedError::ValidationError { message, .. }) => {
                message.clone()
            }
            BackendError::InvalidBody(rejection) => rejection.body_text(),
            other => other.to_string(),
        }
    }
}
