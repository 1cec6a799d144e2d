//! Ensayador library: command definitions and plumbing for the
//! `ensayador` binary.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod commands;
mod error;
mod output;

pub use commands::{Cli, Commands, RunArgs, ValidateArgs};
pub use error::{CliError, CliResult};
pub use output::{print_summary, LogTail};

use ensayo::TestPlan;
use std::path::Path;

/// Load a plan file, picking the parser from the file extension.
pub fn load_plan(path: &Path) -> CliResult<TestPlan> {
    let raw = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "json" => Ok(TestPlan::from_json(&raw)?),
        "yaml" | "yml" => Ok(TestPlan::from_yaml(&raw)?),
        _ => Err(CliError::plan(format!(
            "unsupported plan format (expected .json, .yaml, or .yml): {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_plan_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"name":"smoke","steps":[{{"step_order":1,"action":"goto","input_value":"https://example.com"}}]}}"#
        )
        .unwrap();

        let plan = load_plan(file.path()).unwrap();
        assert_eq!(plan.name, "smoke");
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn test_load_plan_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "name: smoke\nsteps:\n  - step_order: 1\n    action: goto\n    input_value: https://example.com\n"
        )
        .unwrap();

        let plan = load_plan(file.path()).unwrap();
        assert_eq!(plan.steps[0].input_value.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_load_plan_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let err = load_plan(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Plan { .. }));
    }
}
