//! Error types for the tracer.

use thiserror::Error;

/// Errors that can occur while configuring or instrumenting functions.
///
/// Timing itself never fails: stale ends and unknown identities are absorbed
/// silently. The only hard failure, a watched identity missing from the
/// registry, is a panic rather than a variant here.
#[derive(Debug, Error)]
pub enum TracerError {
    /// The function is already timed through the interception hook
    #[error("Function \"{name}\" is already watched by the interception hook and cannot also be wrapped")]
    DoubleInstrumentation { name: String },

    /// Failed to parse or serialize configuration
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for tracer operations.
pub type TracerResult<T> = Result<T, TracerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TracerError::DoubleInstrumentation {
            name: "fib".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Function \"fib\" is already watched by the interception hook and cannot also be wrapped"
        );

        let err = TracerError::InvalidConfig("precision too large".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: precision too large");
    }

    #[test]
    fn test_config_error_conversion() {
        let json_err: Result<(), serde_json::Error> = serde_json::from_str::<()>("{not json");
        let tracer_err: TracerError = json_err.unwrap_err().into();
        assert!(matches!(tracer_err, TracerError::Config(_)));
    }
}
