//! Error types for taskpilot
//!
//! Each collaborator has its own error enum next to its trait; this module
//! gathers them into the crate-level error used by the session and CLI.

use thiserror::Error;

use crate::browser::DriverError;
use crate::executor::ExecutionError;
use crate::llm::LlmError;

/// All error types that can surface outside the plan-execution loop
#[derive(Debug, Error)]
pub enum PilotError {
    /// Shell command execution failed
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Browser driver failed
    #[error("Browser error: {0}")]
    Driver(#[from] DriverError),

    /// Language-model API failed
    #[error("Model error: {0}")]
    Model(#[from] LlmError),

    /// Invalid configuration or arguments
    #[error("Config error: {0}")]
    Config(String),

    /// Caller supplied an unusable input (empty goal, bad directory, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PilotError {
    /// Whether the collaborator behind this error can no longer be used
    pub fn is_fatal(&self) -> bool {
        match self {
            PilotError::Execution(e) => e.is_fatal(),
            PilotError::Driver(e) => e.is_fatal(),
            PilotError::Model(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for taskpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = PilotError::Config("unknown provider 'foo'".to_string());
        assert_eq!(err.to_string(), "Config error: unknown provider 'foo'");
    }

    #[test]
    fn test_invalid_input_error() {
        let err = PilotError::InvalidInput("goal is empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: goal is empty");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_execution_error_conversion() {
        let err: PilotError = ExecutionError::Timeout { timeout_ms: 100 }.into();
        assert!(matches!(err, PilotError::Execution(_)));
        assert!(err.to_string().contains("timed out"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_driver_error_fatality_passes_through() {
        let lost: PilotError = DriverError::SessionLost("websocket closed".to_string()).into();
        assert!(lost.is_fatal());

        let missing: PilotError = DriverError::ElementNotFound {
            selector: "#go".to_string(),
        }
        .into();
        assert!(!missing.is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PilotError = io_err.into();
        assert!(matches!(err, PilotError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: PilotError = json_err.into();
        assert!(matches!(err, PilotError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(PilotError::InvalidInput("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
