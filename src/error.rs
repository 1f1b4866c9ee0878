//! Error types for the Serene client

use thiserror::Error;

/// Errors that can occur when talking to a Serene server
#[derive(Error, Debug)]
pub enum SereneError {
    /// Invalid argument, out-of-range property, or unsatisfied upload
    /// dependency. Always raised before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested identifier is unknown to the server
    #[error("{kind} {key} does not exist on server")]
    NotFound { kind: &'static str, key: i64 },

    /// The operation needs a stored (or trained) object
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Non-success response from the server
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A bounded poll ran out of attempts
    #[error("Timed out after {attempts} polls waiting for {what}")]
    Timeout { what: String, attempts: u32 },

    /// A poll was cancelled by the caller
    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),
}

impl SereneError {
    /// Shorthand for a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        SereneError::Validation(msg.into())
    }

    /// Shorthand for a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        SereneError::Precondition(msg.into())
    }

    /// Shorthand for a malformed server payload
    pub(crate) fn malformed(what: &str, detail: impl std::fmt::Display) -> Self {
        SereneError::Validation(format!("malformed {} payload: {}", what, detail))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SereneError::NotFound { .. })
    }
}

pub type SereneResult<T> = Result<T, SereneError>;
