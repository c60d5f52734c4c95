//! Error types for pagesmith.

use thiserror::Error;

/// Result type alias using pagesmith's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for job store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Transport-level failure talking to the job store.
///
/// Callers branch on the variant, never on message text: `Unavailable`,
/// `Timeout`, and `ServerError` are worth retrying, `BadRequest` is not.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store not reachable: no base URL configured, DNS/connect failure,
    /// or the connection dropped mid-request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The per-call deadline elapsed before a response arrived.
    #[error("Store timeout: {op} exceeded {secs}s")]
    Timeout { op: &'static str, secs: u64 },

    /// The store rejected the request (HTTP 4xx).
    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// The store failed internally (HTTP 5xx) or returned an unusable body.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
}

impl StoreError {
    /// Whether a later retry of the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::BadRequest { .. })
    }

    /// HTTP status carried by the error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::BadRequest { status, .. } | StoreError::ServerError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Core error type for pagesmith operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Job store call failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Job orchestration error
    #[error("Job error: {0}")]
    Job(String),

    /// Git operation failed
    #[error("Git error: {0}")]
    Git(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Truncate an error message to the store's reporting cap.
///
/// Subprocess stderr and panic payloads can run to megabytes; everything
/// reported through `mark_failed` passes through here first. Cuts on a char
/// boundary and marks the cut.
pub fn truncate_message(msg: &str) -> String {
    const MAX: usize = crate::defaults::ERROR_MESSAGE_MAX_LENGTH;
    if msg.len() <= MAX {
        return msg.to_string();
    }
    let mut end = MAX;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    format!("{} [truncated]", &msg[..end])
}
