//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// The plan file could not be loaded or is malformed
    #[error("Plan error: {message}")]
    Plan {
        /// Error message
        message: String,
    },

    /// The run finished in a failed state
    #[error("Run failed: {message}")]
    RunFailed {
        /// Error message
        message: String,
    },

    /// Browser control was not compiled in
    #[error("Browser control not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error
    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),

    /// Engine error
    #[error("{0}")]
    Ensayo(#[from] ensayo::EnsayoError),
}

impl CliError {
    /// Create a plan error
    #[must_use]
    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
        }
    }

    /// Create a run-failed error
    #[must_use]
    pub fn run_failed(message: impl Into<String>) -> Self {
        Self::RunFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_unavailable_names_the_feature() {
        let msg = CliError::BrowserUnavailable.to_string();
        assert!(msg.contains("--features browser"));
    }

    #[test]
    fn test_engine_errors_convert() {
        let err: CliError = ensayo::EnsayoError::Cancelled.into();
        assert!(matches!(err, CliError::Ensayo(_)));
    }
}
