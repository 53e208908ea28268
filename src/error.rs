//! Unified error hierarchy for RideLens
//!
//! The synchronous pipelines are total functions and never fail on degraded
//! input. Errors exist for contract violations (malformed points), bad
//! configuration, import plumbing, and the terrain query service.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for all RideLens operations
#[derive(Debug, Error)]
pub enum RideLensError {
    /// A track point violates the input contract (non-finite or out of range)
    #[error("Invalid track point at index {index}: {reason}")]
    InvalidPoint { index: usize, reason: String },

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
}

/// Calculation errors
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },
}

/// Track import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// File contained no usable points
    #[error("No track points found in {path}")]
    Empty { path: PathBuf },
}

/// Failure of a single land-use service request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// The request did not complete within the per-request timeout
    #[error("Request to {endpoint} timed out after {after:?}")]
    Timeout { endpoint: String, after: Duration },

    /// Transport or HTTP status failure
    #[error("Request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    /// The service answered but the payload cannot be mapped back to the query
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

impl ServiceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Timeout { .. })
    }

    /// Timeouts and transport failures are worth another attempt. A malformed
    /// response is not; it escapes the batch and triggers the fallback path.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ServiceError::MalformedResponse { .. })
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ServiceError::Timeout { endpoint, .. }
            | ServiceError::Request { endpoint, .. }
            | ServiceError::MalformedResponse { endpoint, .. } => endpoint,
        }
    }
}

/// Result type alias for RideLens operations
pub type Result<T> = std::result::Result<T, RideLensError>;

impl RideLensError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RideLensError::InvalidPoint { .. } => ErrorSeverity::Error,
            RideLensError::Configuration(_) => ErrorSeverity::Critical,
            RideLensError::Import(ImportError::Empty { .. }) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RideLensError::InvalidPoint { index, .. } => format!(
                "The route contains an unusable GPS fix at position {}. Please check the source file.",
                index
            ),
            RideLensError::Import(ImportError::Empty { path }) => {
                format!("No GPS points were found in {}", path.display())
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical error, nothing can be analyzed
    Critical,
    /// Error that prevents the current operation
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = RideLensError::InvalidPoint {
            index: 3,
            reason: "latitude is NaN".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Error);

        let err = RideLensError::Configuration("batch_size must be > 0".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_service_error_retry_policy() {
        let timeout = ServiceError::Timeout {
            endpoint: "a".to_string(),
            after: Duration::from_secs(15),
        };
        assert!(timeout.is_timeout());
        assert!(timeout.is_retryable());

        let request = ServiceError::Request {
            endpoint: "a".to_string(),
            reason: "502".to_string(),
        };
        assert!(!request.is_timeout());
        assert!(request.is_retryable());

        let malformed = ServiceError::MalformedResponse {
            endpoint: "b".to_string(),
            reason: "marker missing".to_string(),
        };
        assert!(!malformed.is_retryable());
        assert_eq!(malformed.endpoint(), "b");
    }

    #[test]
    fn test_user_messages() {
        let err = RideLensError::InvalidPoint {
            index: 7,
            reason: "longitude out of range".to_string(),
        };
        assert!(err.user_message().contains("position 7"));
    }
}
