//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ensayador: CLI for Ensayo - execute declarative browser UI test plans
#[derive(Parser, Debug)]
#[command(name = "ensayador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a test plan against a live browser session
    Run(RunArgs),

    /// Check plan files for configuration errors without running them
    Validate(ValidateArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Plan file (.json, .yaml, or .yml)
    pub plan: PathBuf,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Disable the browser sandbox (for containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the chromium executable
    #[arg(long)]
    pub chromium: Option<PathBuf>,

    /// Settle delay after each interaction, in milliseconds
    #[arg(long, default_value = "1000")]
    pub settle_ms: u64,

    /// Condition-wait timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Abort the whole run after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Write the full run report as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Plan files to check
    #[arg(required = true)]
    pub plans: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["ensayador", "run", "plan.json"]);
        match cli.command {
            Commands::Run(args) => {
                assert!(!args.headed);
                assert_eq!(args.settle_ms, 1000);
                assert_eq!(args.timeout_secs, 10);
                assert!(args.deadline_secs.is_none());
            }
            Commands::Validate(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_validate_requires_at_least_one_plan() {
        assert!(Cli::try_parse_from(["ensayador", "validate"]).is_err());
    }
}
