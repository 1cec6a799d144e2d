//! Ensayador CLI: run and validate browser UI test plans
//!
//! ## Usage
//!
//! ```bash
//! ensayador run plan.yaml              # Execute a plan headless
//! ensayador run plan.yaml --headed     # Show the browser window
//! ensayador run plan.yaml -o out.json  # Write the full run report
//! ensayador validate plans/*.yaml      # Check plans without running
//! ```

use clap::Parser;
use console::style;
use ensayador::{load_plan, Cli, CliError, CliResult, Commands, RunArgs, ValidateArgs};
use ensayo::TestPlan;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let quiet = cli.quiet;
    match dispatch(cli, quiet) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: Cli, quiet: bool) -> CliResult<()> {
    match cli.command {
        Commands::Run(args) => run_plan(&args, quiet),
        Commands::Validate(args) => validate_plans(&args),
    }
}

fn validate_plans(args: &ValidateArgs) -> CliResult<()> {
    let mut bad = 0usize;
    for path in &args.plans {
        let checked = load_plan(path).and_then(|plan| {
            plan.validate()?;
            Ok(plan)
        });
        match checked {
            Ok(plan) => println!(
                "{} {}: {} steps",
                style("✓").green(),
                path.display(),
                plan.steps.len()
            ),
            Err(e) => {
                bad += 1;
                eprintln!("{} {}: {e}", style("✗").red(), path.display());
            }
        }
    }
    if bad == 0 {
        Ok(())
    } else {
        Err(CliError::plan(format!("{bad} plan file(s) failed validation")))
    }
}

fn run_plan(args: &RunArgs, quiet: bool) -> CliResult<()> {
    let plan = load_plan(&args.plan)?;
    plan.validate()?;
    tracing::info!(plan = %plan.name, steps = plan.steps.len(), "plan loaded");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute(plan, args, quiet))
}

#[cfg(feature = "browser")]
async fn execute(plan: TestPlan, args: &RunArgs, quiet: bool) -> CliResult<()> {
    use ensayador::LogTail;
    use ensayo::{ChromiumSession, RunConfig, RunController, SessionConfig, TestRun, WaitPolicy};
    use std::time::Duration;

    let mut session_config = SessionConfig::new().with_headless(!args.headed);
    if args.no_sandbox {
        session_config = session_config.with_no_sandbox();
    }
    if let Some(ref path) = args.chromium {
        session_config = session_config.with_chromium_path(path.display().to_string());
    }

    let driver = match ChromiumSession::launch(session_config).await {
        Ok(driver) => driver,
        Err(err) => {
            // No session, no steps: record a pre-aborted run so the
            // report still exists for pollers and the output file.
            let run = TestRun::aborted(&plan.name, &err.to_string());
            return finish(&run, args, quiet);
        }
    };

    let mut config = RunConfig::new()
        .with_wait(WaitPolicy::new().with_timeout(Duration::from_secs(args.timeout_secs)))
        .with_settle(Duration::from_millis(args.settle_ms));
    if let Some(secs) = args.deadline_secs {
        config = config.with_plan_deadline(Duration::from_secs(secs));
    }

    let handle = RunController::new(config).spawn(plan, Box::new(driver));

    // Stream narration as it appears rather than dumping it at the end
    let mut tail = LogTail::new();
    while !handle.is_finished() {
        if !quiet {
            tail.drain(&handle.snapshot().log);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let run = handle.wait().await;
    if !quiet {
        tail.drain(&run.log);
    }
    finish(&run, args, quiet)
}

#[cfg(not(feature = "browser"))]
async fn execute(_plan: TestPlan, _args: &RunArgs, _quiet: bool) -> CliResult<()> {
    Err(CliError::BrowserUnavailable)
}

#[cfg(feature = "browser")]
fn finish(run: &ensayo::TestRun, args: &RunArgs, quiet: bool) -> CliResult<()> {
    if let Some(ref path) = args.output {
        std::fs::write(path, serde_json::to_string_pretty(run)?)?;
    }
    if !quiet {
        ensayador::print_summary(run);
    }
    if run.status == ensayo::RunStatus::Success {
        Ok(())
    } else {
        Err(CliError::run_failed(format!(
            "plan '{}' did not pass",
            run.plan_name
        )))
    }
}
