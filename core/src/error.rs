use thiserror::Error;

/// Error kinds shared across the picker. Nothing here is retried internally;
/// retries, if any, belong to the transport layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A record failed validation and could not be repaired, or a payload
    /// could not be interpreted at all.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The optimistic timestamp check failed: another writer committed after
    /// the editor's read. Surfaced as a user-correctable error, never retried
    /// automatically.
    #[error("record was modified by another writer (observed ts {observed}, current ts {current})")]
    Conflict { observed: i64, current: i64 },

    /// A backing bookmark or message does not exist. For records this
    /// triggers lazy initialization; a session without its message cannot be
    /// reconstructed.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A platform API call failed or returned a non-ok envelope. The body is
    /// logged at the call site.
    #[error("platform call failed: {context}")]
    External { context: String },

    /// A vote session is terminal: no further votes or reveals are accepted.
    #[error("vote session has already ended")]
    SessionEnded,
}

/// Machine-readable error codes used in webhook error responses.
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const CONFLICT: &str = "conflict";
    pub const NOT_FOUND: &str = "not_found";
    pub const EXTERNAL_CALL_FAILED: &str = "external_call_failed";
    pub const SESSION_ENDED: &str = "session_ended";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
