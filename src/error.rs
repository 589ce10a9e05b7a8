//! Engine-wide error taxonomy.
//!
//! Every fallible operation in `literoom_core` returns [`EngineError`]. The
//! [`ErrorKind`] mirror exists because the host-facing render response
//! serializes errors as a bare `{ kind, message }` pair rather
//! than a Rust-shaped enum with payloads.

use std::path::PathBuf;

use thiserror::Error;

/// The engine's single error type.
///
/// Decoder and Resize propagate these unchanged. The Backend Executor
/// recovers from `GpuLost`/`GpuError`/`OutOfMemory` by falling back to CPU
/// once per request; any further failure is surfaced. The Thumbnail
/// service records the error on the asset's cache status and does not
/// retry. Catalog errors are surfaced to the user verbatim.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported or unrecognized format")]
    InvalidFormat,

    #[error("data is malformed or truncated: {0}")]
    Corrupted(String),

    #[error("no embedded preview found in RAW container")]
    NoEmbeddedPreview,

    #[error("allocation failed")]
    OutOfMemory,

    #[error("GPU device was lost: {0}")]
    GpuLost(String),

    #[error("GPU backend error: {0}")]
    GpuError(String),

    #[error("permission denied for {path:?}")]
    PermissionDenied { path: PathBuf },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidFormat => ErrorKind::InvalidFormat,
            EngineError::Corrupted(_) => ErrorKind::Corrupted,
            EngineError::NoEmbeddedPreview => ErrorKind::NoEmbeddedPreview,
            EngineError::OutOfMemory => ErrorKind::OutOfMemory,
            EngineError::GpuLost(_) => ErrorKind::GpuLost,
            EngineError::GpuError(_) => ErrorKind::GpuError,
            EngineError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Counts toward the backend executor's three-strikes GPU breaker.
    pub fn counts_as_gpu_failure(&self) -> bool {
        matches!(
            self,
            EngineError::GpuLost(_) | EngineError::GpuError(_) | EngineError::OutOfMemory
        )
    }
}

/// Wire-stable tag for [`EngineError`]'s error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidFormat,
    Corrupted,
    NoEmbeddedPreview,
    OutOfMemory,
    GpuLost,
    GpuError,
    PermissionDenied,
    NotFound,
    Cancelled,
    Internal,
}

/// The `{ kind, message }` shape carried in a render response's error arm.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EngineError> for ErrorPayload {
    fn from(err: &EngineError) -> Self {
        ErrorPayload {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
