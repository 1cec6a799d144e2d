//! Result and error types for Ensayo.

use crate::plan::{SelectorKind, WaitKind};
use thiserror::Error;

/// Result type for Ensayo operations
pub type EnsayoResult<T> = Result<T, EnsayoError>;

/// Errors that can occur while authoring or executing a test plan.
///
/// Configuration errors (`UnsupportedSelector`, `MissingField`,
/// `UnknownAction`, `InvalidDirective`, `InvalidPlan`) are always
/// step-fatal and never retried. `WaitTimeout` and `AssertionFailed`
/// are distinct variants so a caller can tell a synchronization
/// failure from a genuine assertion mismatch.
#[derive(Debug, Error)]
pub enum EnsayoError {
    /// Selector kind string not recognized by the locator resolver
    #[error("Unsupported selector kind: {kind}")]
    UnsupportedSelector {
        /// The unrecognized kind as authored
        kind: String,
    },

    /// Action string not recognized by the dispatcher
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// The unrecognized action as authored
        action: String,
    },

    /// A step is missing a field its action requires
    #[error("Step {step_order}: missing required field `{field}`")]
    MissingField {
        /// Order of the misconfigured step
        step_order: u32,
        /// Name of the absent field
        field: &'static str,
    },

    /// A string-encoded directive could not be decoded
    #[error("Invalid directive: {value}")]
    InvalidDirective {
        /// The directive as authored
        value: String,
    },

    /// The plan as a whole is malformed (step order gaps or duplicates)
    #[error("Invalid plan: {message}")]
    InvalidPlan {
        /// What is wrong with the plan
        message: String,
    },

    /// A condition-based wait did not become true within its bound
    #[error("Timed out after {timeout_ms}ms waiting for {wait} of {selector}={value}")]
    WaitTimeout {
        /// The wait condition that was not met
        wait: WaitKind,
        /// Selector kind of the awaited element
        selector: SelectorKind,
        /// Selector value of the awaited element
        value: String,
        /// Bound that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// An assert step's expected text was not found
    #[error("Assertion failed: expected '{expected}' in element text '{actual}'")]
    AssertionFailed {
        /// Substring the step expected
        expected: String,
        /// Text the element actually contained
        actual: String,
    },

    /// Browser session could not be created or crashed
    #[error("Browser session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// Navigation failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Element interaction (click, type, select, ...) failed
    #[error("Interaction failed: {message}")]
    Interaction {
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// The run was cancelled between steps
    #[error("Run cancelled")]
    Cancelled,

    /// The plan-level deadline elapsed between steps
    #[error("Plan deadline of {limit_ms}ms exceeded")]
    DeadlineExceeded {
        /// Configured deadline, in milliseconds
        limit_ms: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl EnsayoError {
    /// Whether this error is a plan-authoring mistake rather than a
    /// runtime condition.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSelector { .. }
                | Self::UnknownAction { .. }
                | Self::MissingField { .. }
                | Self::InvalidDirective { .. }
                | Self::InvalidPlan { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_display_names_the_selector() {
        let err = EnsayoError::WaitTimeout {
            wait: WaitKind::Clickable,
            selector: SelectorKind::ById,
            value: "login".to_string(),
            timeout_ms: 10_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("10000ms"));
        assert!(msg.contains("byid=login"));
        assert!(msg.contains("clickable"));
    }

    #[test]
    fn test_assertion_failed_carries_expected_and_actual() {
        let err = EnsayoError::AssertionFailed {
            expected: "Welcome".to_string(),
            actual: "Goodbye".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Welcome"));
        assert!(msg.contains("Goodbye"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(EnsayoError::UnknownAction {
            action: "swipe".to_string()
        }
        .is_configuration());
        assert!(EnsayoError::MissingField {
            step_order: 3,
            field: "selector"
        }
        .is_configuration());
        assert!(!EnsayoError::Cancelled.is_configuration());
        assert!(!EnsayoError::AssertionFailed {
            expected: String::new(),
            actual: String::new()
        }
        .is_configuration());
    }
}
