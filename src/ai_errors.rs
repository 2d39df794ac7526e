//! # AI Error Types Module
//!
//! Error types raised by the AI text-generation collaborator. The quota
//! condition is kept distinct from every other failure because it stops a
//! whole batch, while the rest only switch the parser to its fallback.

/// Custom error types for AI text generation
#[derive(Debug, Clone, PartialEq)]
pub enum AiError {
    /// The daily usage allowance is exhausted
    QuotaExceeded(String),
    /// Transient throttling (HTTP 429 without a quota code)
    RateLimited(String),
    /// Non-success HTTP status from the provider
    Api { status: u16, message: String },
    /// Connection, TLS or timeout failures
    Transport(String),
    /// No provider configured or circuit breaker open
    Unavailable(String),
    /// The provider answered but the payload could not be read
    InvalidResponse(String),
}

impl AiError {
    /// Whether a retry of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::RateLimited(_) | AiError::Transport(_) => true,
            AiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiError::QuotaExceeded(msg) => write!(f, "[AI_QUOTA] Daily quota exceeded: {}", msg),
            AiError::RateLimited(msg) => write!(f, "[AI_RATE_LIMIT] Request throttled: {}", msg),
            AiError::Api { status, message } => {
                write!(f, "[AI_API] Provider returned {}: {}", status, message)
            }
            AiError::Transport(msg) => write!(f, "[AI_TRANSPORT] Request failed: {}", msg),
            AiError::Unavailable(msg) => write!(f, "[AI_UNAVAILABLE] {}", msg),
            AiError::InvalidResponse(msg) => {
                write!(f, "[AI_RESPONSE] Could not read provider reply: {}", msg)
            }
        }
    }
}

impl std::error::Error for AiError {}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Transport(err.to_string())
    }
}
