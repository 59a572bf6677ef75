//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Kernel errors.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A block failed validation. Carries the zero-based index of the
    /// offending block and a human-readable reason.
    #[error("block {index}: {reason}")]
    Validation { index: usize, reason: String },

    /// The record does not exist, or is in the wrong lifecycle partition
    /// for the requested operation.
    #[error("not found")]
    NotFound,

    /// The operation cannot proceed because a dependency is gone
    /// (e.g. restoring a record whose backing file has been purged).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence or lookup dependency failure.
    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

impl KernelError {
    /// Build a validation error for the block at `index`.
    pub fn validation(index: usize, reason: impl Into<String>) -> Self {
        Self::Validation {
            index,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for KernelError {
    fn into_response(self) -> Response {
        let status = match &self {
            KernelError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            KernelError::NotFound => StatusCode::NOT_FOUND,
            KernelError::Conflict(_) => StatusCode::CONFLICT,
            KernelError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage details are logged, never leaked to the caller.
        let body = match &self {
            KernelError::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using KernelError.
pub type KernelResult<T> = Result<T, KernelError>;
