//! Client error definitions

use thiserror::Error;

/// Errors surfaced by the upload client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to initiate upload: {0}")]
    Initiation(String),

    #[error("Failed to presign parts: {0}")]
    Presign(String),

    #[error("Part {part_number} failed after {attempts} attempts: {message}")]
    PartUpload {
        part_number: u32,
        attempts: u32,
        message: String,
    },

    #[error("Failed to complete upload: {0}")]
    Completion(String),

    #[error("Part set rejected at completion, abort and restart the upload: {0}")]
    CompletionMismatch(String),

    #[error("Failed to abort upload: {0}")]
    Abort(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Source is empty")]
    EmptySource,

    #[error("Invalid chunk plan: {0}")]
    InvalidPlan(String),

    #[error("Upload state error: {0}")]
    State(#[from] StateError),

    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether retrying the same upload later can succeed by resuming
    pub fn is_resumable(&self) -> bool {
        !matches!(
            self,
            Self::CompletionMismatch(_) | Self::EmptySource | Self::InvalidPlan(_)
        )
    }
}

/// Errors from the session state store
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from a single part PUT
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network failure, timeout or server-side error; worth retrying
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from the upload control API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("upload API unreachable: {0}")]
    Unavailable(String),

    #[error("upload API returned {status} ({code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
}

impl ApiError {
    pub fn is_completion_mismatch(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == "completion_mismatch")
    }
}
