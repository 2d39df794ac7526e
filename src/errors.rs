//! # Application Error Types
//!
//! This module defines the error types shared across the intake pipeline.
//! `AppError` covers application-level failures (configuration, database,
//! network), while `PipelineError` is the per-input / per-item taxonomy the
//! batch orchestrator uses to decide whether to skip or halt.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (item names, inputs, etc.)
    Validation(String),
    /// Database operation errors
    Database(String),
    /// Network/communication errors
    Network(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Database(msg) => write!(f, "[DATABASE] {}", msg),
            AppError::Network(msg) => write!(f, "[NETWORK] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Failure conditions raised while one input (or one item of an input)
/// moves through the pipeline.
///
/// Only [`PipelineError::QuotaExceeded`] may end a batch early. Every other
/// variant is absorbed by the orchestrator and shows up in its counters.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Text could not be extracted from an input (unreadable image/audio)
    Extraction(String),
    /// The AI collaborator reported that the daily allowance is spent
    QuotaExceeded(String),
    /// The AI reply did not honour the marker contract
    MalformedResponse(String),
    /// Committing an item to the store failed; the item was rolled back
    Persistence(String),
}

impl PipelineError {
    /// Whether this condition must halt the whole batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::QuotaExceeded(_))
    }

    /// Short stable label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) => "extraction",
            PipelineError::QuotaExceeded(_) => "quota_exceeded",
            PipelineError::MalformedResponse(_) => "malformed_response",
            PipelineError::Persistence(_) => "persistence",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Extraction(msg) => {
                write!(f, "[EXTRACTION] Text extraction failed: {}", msg)
            }
            PipelineError::QuotaExceeded(msg) => {
                write!(f, "[QUOTA] Daily AI quota exceeded: {}", msg)
            }
            PipelineError::MalformedResponse(msg) => {
                write!(f, "[MALFORMED] AI response did not follow the item contract: {}", msg)
            }
            PipelineError::Persistence(msg) => {
                write!(f, "[PERSISTENCE] Inventory commit failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<crate::ai_errors::AiError> for PipelineError {
    fn from(err: crate::ai_errors::AiError) -> Self {
        match err {
            crate::ai_errors::AiError::QuotaExceeded(msg) => PipelineError::QuotaExceeded(msg),
            other => PipelineError::MalformedResponse(other.to_string()),
        }
    }
}

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use tracing::error;

    /// Log database operation errors with contextual information
    pub fn log_database_error(
        error: &impl std::fmt::Display,
        operation: &str,
        item_name: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            item_name = ?item_name,
            "Database operation failed"
        );
    }

    /// Log a per-input failure inside a batch run
    pub fn log_input_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_index: usize,
        source: &str,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_index = %input_index,
            source = %source,
            "Batch input processing failed"
        );
    }

    /// Log a per-item merge failure
    pub fn log_merge_error(
        error: &impl std::fmt::Display,
        item_name: &str,
        quantity: u32,
        unit: &str,
    ) {
        error!(
            error = %error,
            item_name = %item_name,
            quantity = %quantity,
            unit = %unit,
            "Inventory merge failed"
        );
    }

    /// Log network/communication errors with connection context
    pub fn log_network_error(
        error: &impl std::fmt::Display,
        operation: &str,
        endpoint: Option<&str>,
        attempt_count: Option<u32>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            endpoint = ?endpoint,
            attempt_count = ?attempt_count,
            "Network operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(
        error: &impl std::fmt::Display,
        config_key: &str,
        operation: &str,
    ) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_errors::AiError;

    #[test]
    fn test_only_quota_is_fatal() {
        assert!(PipelineError::QuotaExceeded("daily".into()).is_fatal());
        assert!(!PipelineError::Extraction("blurry".into()).is_fatal());
        assert!(!PipelineError::MalformedResponse("no markers".into()).is_fatal());
        assert!(!PipelineError::Persistence("deadlock".into()).is_fatal());
    }

    #[test]
    fn test_ai_error_conversion() {
        let quota: PipelineError = AiError::QuotaExceeded("limit 50".into()).into();
        assert_eq!(quota, PipelineError::QuotaExceeded("limit 50".into()));

        let transport: PipelineError = AiError::Transport("reset".into()).into();
        assert!(matches!(transport, PipelineError::MalformedResponse(_)));
    }

    #[test]
    fn test_display_tags() {
        assert!(AppError::Config("x".into()).to_string().starts_with("[CONFIG]"));
        assert!(PipelineError::Persistence("x".into())
            .to_string()
            .starts_with("[PERSISTENCE]"));
    }
}
