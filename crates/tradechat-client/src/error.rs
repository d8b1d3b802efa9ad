//! Error types for chat client operations.

use thiserror::Error;

/// Result type for chat client operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors surfaced by the conversation subsystem.
///
/// Everything here is caught at a component boundary and routed to the
/// user-facing notifier; nothing is fatal to the embedding page. A failed
/// fetch leaves the conversation view stale but functional.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChatError {
    /// Bad file type/size or an empty send. Rejected locally, never hits
    /// the network; surfaced inline, not as a toast.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Message page load failed. Surfaced with a retry control; already
    /// rendered messages stay untouched.
    #[error("message fetch failed: {0}")]
    FetchFailed(String),

    /// Attachment upload failed; the job reverts to its preview state so
    /// the user can retry without re-selecting the file.
    #[error("attachment upload failed: {0}")]
    UploadFailed(String),

    /// The send call failed after any upload succeeded; same retry
    /// semantics as [`ChatError::UploadFailed`].
    #[error("message send failed: {0}")]
    SendFailed(String),

    /// Socket channel went away. Typing indicators silently stop; not
    /// treated as fatal.
    #[error("socket connection lost")]
    ConnectionLost,

    /// An operation was invoked in a pipeline state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Local rejection that never reached the network.
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::ValidationFailed(_))
    }

    /// Whether retrying the same operation can reasonably succeed.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::FetchFailed(_) | ChatError::UploadFailed(_) | ChatError::SendFailed(_)
        )
    }
}
