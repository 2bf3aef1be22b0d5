use thiserror::Error;

use hearth_shared::error::ValidationError;
use hearth_store::StoreError;

/// Errors surfaced by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No signed-in session; the operation was skipped.
    #[error("Not signed in")]
    Unauthenticated,

    /// Transport-level REST failure (DNS, refused, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A success response whose body did not match the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}
