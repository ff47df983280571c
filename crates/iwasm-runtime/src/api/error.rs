//! Errors seen by host code using the safe wrapper.

use thiserror::Error;

/// Error returned by the host-side handles and envelopes.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The boundary reported a failure; the message is opaque
    #[error("{0}")]
    Boundary(String),

    /// An operation was attempted on a handle whose creation failed
    #[error("{operation} called on a failed handle: {cause}")]
    Precondition {
        /// Operation that was refused
        operation: &'static str,
        /// Creation failure of the handle
        cause: String,
    },

    /// Runtime configuration could not be encoded for the boundary
    #[error("invalid runtime config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ApiError {
    /// True when the error was produced locally, without crossing the boundary.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ApiError::Precondition { .. })
    }
}
