//! Error types for the AI module

use thiserror::Error;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} API error (status {status}): {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LlmHttp { status, .. } => *status == 429 || *status >= 500,
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Llm(message) => {
                let message = message.to_lowercase();
                message.contains("rate limit")
                    || message.contains("overloaded")
                    || message.contains("timeout")
            }
            Self::InvalidFormat(_) | Self::Json(_) => false,
        }
    }

    /// Server-provided retry hint in seconds, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::LlmHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
