//! Error types for the LLM layer.

use thiserror::Error;

/// Errors that can occur while talking to a language model.
#[derive(Error, Debug)]
pub enum AiError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend did not answer in time.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The answer could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The backend is misconfigured (missing key, bad URL).
    #[error("configuration error: {0}")]
    Config(String),
}

impl AiError {
    /// Whether this error represents an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AiError::Timeout(_))
    }
}

#[cfg(any(feature = "ollama", feature = "gemini"))]
impl AiError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            AiError::Timeout(timeout_secs)
        } else if err.is_decode() {
            AiError::InvalidResponse(err.to_string())
        } else {
            AiError::Request(err.to_string())
        }
    }
}
