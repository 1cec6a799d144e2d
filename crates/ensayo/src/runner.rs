//! Run controller: owns the run lifecycle for one plan on one browser
//! session.
//!
//! State machine: `Pending → Running → {Success, Failed}`, terminal
//! states final. Steps execute strictly in ascending order; the first
//! step-level failure stops the run (fail-fast), since later steps
//! depend on DOM state the failed step was meant to produce. Every
//! terminal failure goes through one shared routine that records the
//! error and attempts exactly one best-effort screenshot.
//!
//! A run is never left in `Running`: finalization always sets
//! `ended_at` and releases the session, swallowing release errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatch::{Dispatcher, StepStatus, DEFAULT_SETTLE_MS};
use crate::driver::Driver;
use crate::plan::{Action, TestPlan, TestStep};
use crate::result::EnsayoError;
use crate::wait::WaitPolicy;

/// Lifecycle state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created but not yet started
    Pending,
    /// Steps are executing
    Running,
    /// All steps completed without a step-level failure
    Success,
    /// A step failed, the run was cancelled, or the engine failed
    Failed,
}

impl RunStatus {
    /// Whether this is a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Recorded outcome of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStepResult {
    /// Order of the step this records
    pub step_order: u32,
    /// Action of the step this records
    pub action: Action,
    /// Terminal outcome
    pub status: StepStatus,
    /// Narrated outcome or error text
    pub message: String,
    /// PNG evidence: present for screenshot steps and failed steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Vec<u8>>,
}

/// One execution attempt of a test plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Unique run identifier
    pub id: Uuid,
    /// Name of the executed plan
    pub plan_name: String,
    /// Lifecycle state
    pub status: RunStatus,
    /// When execution began
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state; set exactly once
    pub ended_at: Option<DateTime<Utc>>,
    /// Ordered narration of every step line and outcome
    pub log: String,
    /// Run-level failure evidence when no step was in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_screenshot: Option<Vec<u8>>,
    /// One result per attempted step; a failed run has exactly the
    /// steps attempted before the fail-fast stop
    pub step_results: Vec<TestStepResult>,
}

impl TestRun {
    fn begin(plan_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_name: plan_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            log: String::new(),
            error_screenshot: None,
            step_results: Vec::new(),
        }
    }

    /// A run that failed before its session could be created.
    ///
    /// Used by callers when the browser itself cannot be launched;
    /// the record is already finalized so no run is left in `Running`.
    #[must_use]
    pub fn aborted(plan_name: impl Into<String>, message: &str) -> Self {
        let mut run = Self::begin(plan_name);
        run.append_log(format!("[ERROR] {message}"));
        run.status = RunStatus::Failed;
        run.ended_at = Some(Utc::now());
        run
    }

    /// Wall-clock duration, available once the run is finalized
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// The polling read model for progress reporting
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            status: self.status,
            log: self.log.clone(),
            ended_at: self.ended_at,
            duration_ms: self.duration().map(|d| d.num_milliseconds()),
            has_error_screenshot: self.error_screenshot.is_some()
                || self
                    .step_results
                    .iter()
                    .any(|r| r.status == StepStatus::Failed && r.screenshot.is_some()),
        }
    }

    fn append_log(&mut self, line: impl AsRef<str>) {
        if !self.log.is_empty() {
            self.log.push('\n');
        }
        self.log.push_str(line.as_ref());
    }
}

/// Status-polling read model exposed to callers while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Current lifecycle state
    pub status: RunStatus,
    /// Narration so far
    pub log: String,
    /// Terminal timestamp, if reached
    pub ended_at: Option<DateTime<Utc>>,
    /// Milliseconds from start to finalization, if finalized
    pub duration_ms: Option<i64>,
    /// Whether failure evidence was captured, at run level or on a
    /// failed step
    pub has_error_screenshot: bool,
}

/// Engine configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Wait policy shared by every action
    pub wait: WaitPolicy,
    /// Settle delay after browser-touching actions
    pub settle: Duration,
    /// Optional overall deadline for the whole plan, checked between
    /// steps
    pub plan_deadline: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            plan_deadline: None,
        }
    }
}

impl RunConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait policy
    #[must_use]
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Set the settle delay (zero disables it)
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the plan-level deadline
    #[must_use]
    pub const fn with_plan_deadline(mut self, deadline: Duration) -> Self {
        self.plan_deadline = Some(deadline);
        self
    }
}

/// Cooperative cancellation, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation before the next step
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn lock(shared: &Arc<Mutex<TestRun>>) -> MutexGuard<'_, TestRun> {
    shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Handle to a fire-and-forget run: poll [`RunHandle::snapshot`] for
/// progress, [`RunHandle::cancel`] between steps, and
/// [`RunHandle::wait`] for the finalized record.
#[derive(Debug)]
pub struct RunHandle {
    shared: Arc<Mutex<TestRun>>,
    cancel: CancelToken,
    join: tokio::task::JoinHandle<()>,
}

impl RunHandle {
    /// Current progress read model
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        lock(&self.shared).snapshot()
    }

    /// Request cancellation before the next step
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clonable token for cancelling from elsewhere
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether the engine task has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Await completion and return the finalized run.
    pub async fn wait(self) -> TestRun {
        if self.join.await.is_err() {
            // Engine task panicked. Finalize here so the record is
            // never observed stuck in Running.
            let mut run = lock(&self.shared);
            if !run.status.is_terminal() {
                run.append_log("[ERROR] engine task aborted unexpectedly");
                run.status = RunStatus::Failed;
                run.ended_at = Some(Utc::now());
            }
        }
        lock(&self.shared).clone()
    }
}

/// Executes test plans against an exclusively owned driver session.
#[derive(Debug, Clone, Default)]
pub struct RunController {
    config: RunConfig,
}

impl RunController {
    /// Create a controller with the given configuration
    #[must_use]
    pub const fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the plan to completion on the given session.
    ///
    /// The session is owned by this run for its whole lifetime and is
    /// released unconditionally during finalization.
    pub async fn run(&self, plan: &TestPlan, driver: &mut dyn Driver) -> TestRun {
        let shared = Arc::new(Mutex::new(TestRun::begin(&plan.name)));
        drive(plan, driver, &self.config, &shared, &CancelToken::new()).await;
        Arc::try_unwrap(shared).map_or_else(
            |arc| lock(&arc).clone(),
            |mutex| mutex.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    /// Launch the plan as a background task and return a handle for
    /// polling, cancellation, and completion.
    #[must_use]
    pub fn spawn(&self, plan: TestPlan, mut driver: Box<dyn Driver>) -> RunHandle {
        let shared = Arc::new(Mutex::new(TestRun::begin(&plan.name)));
        let cancel = CancelToken::new();
        let config = self.config.clone();
        let task_shared = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            drive(&plan, driver.as_mut(), &config, &task_shared, &task_cancel).await;
        });
        RunHandle {
            shared,
            cancel,
            join,
        }
    }
}

/// The run loop proper. Mutates `shared` incrementally so pollers see
/// live status and log, then finalizes it exactly once.
async fn drive(
    plan: &TestPlan,
    driver: &mut dyn Driver,
    config: &RunConfig,
    shared: &Arc<Mutex<TestRun>>,
    cancel: &CancelToken,
) {
    let dispatcher = Dispatcher::new(config.wait.clone(), config.settle);
    let deadline = config.plan_deadline.map(|limit| Instant::now() + limit);
    info!(plan = %plan.name, steps = plan.steps.len(), "starting run");

    let mut failed = false;
    if let Err(err) = plan.validate_order() {
        record_failure(shared, driver, None, &err).await;
        failed = true;
    }

    if !failed {
        for step in &plan.steps {
            if cancel.is_cancelled() {
                lock(shared).append_log("[CANCELLED] run stopped before next step");
                record_failure(shared, driver, None, &EnsayoError::Cancelled).await;
                failed = true;
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    let limit_ms = config
                        .plan_deadline
                        .map_or(0, |d| d.as_millis() as u64);
                    record_failure(
                        shared,
                        driver,
                        None,
                        &EnsayoError::DeadlineExceeded { limit_ms },
                    )
                    .await;
                    failed = true;
                    break;
                }
            }

            lock(shared).append_log(format!(
                "[STEP {}] ACTION: {}",
                step.step_order, step.action
            ));
            match dispatcher.execute(step, driver).await {
                Ok(outcome) => {
                    debug!(step = step.step_order, status = %outcome.status, "step done");
                    let mut run = lock(shared);
                    run.append_log(&outcome.message);
                    run.step_results.push(TestStepResult {
                        step_order: step.step_order,
                        action: step.action,
                        status: outcome.status,
                        message: outcome.message,
                        screenshot: outcome.screenshot,
                    });
                }
                Err(err) => {
                    warn!(step = step.step_order, error = %err, "step failed, stopping run");
                    record_failure(shared, driver, Some(step), &err).await;
                    failed = true;
                    break;
                }
            }
        }
    }

    // Finalization: always runs, terminal state and ended_at set once,
    // session released with release errors swallowed.
    {
        let mut run = lock(shared);
        run.status = if failed {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        run.ended_at = Some(Utc::now());
        info!(plan = %plan.name, status = %run.status, "run finalized");
    }
    if let Err(err) = driver.close().await {
        warn!(error = %err, "failed to release browser session");
    }
}

/// The single failure-handling routine shared by step-level and
/// run-level failures: narrate the error, attempt exactly one
/// best-effort screenshot, record the evidence.
async fn record_failure(
    shared: &Arc<Mutex<TestRun>>,
    driver: &mut dyn Driver,
    step: Option<&TestStep>,
    err: &EnsayoError,
) {
    // A screenshot failure here must not escalate a failure we are
    // already recording.
    let screenshot = driver.screenshot().await.ok();
    let mut run = lock(shared);
    run.append_log(format!("[ERROR] {err}"));
    match step {
        Some(step) => run.step_results.push(TestStepResult {
            step_order: step.step_order,
            action: step.action,
            status: StepStatus::Failed,
            message: err.to_string(),
            screenshot,
        }),
        None => run.error_screenshot = screenshot,
    }
    run.status = RunStatus::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use crate::locator::Locator;
    use crate::plan::SelectorKind;

    fn fast_config() -> RunConfig {
        RunConfig::new()
            .with_wait(
                WaitPolicy::new()
                    .with_timeout(Duration::from_millis(150))
                    .with_poll_interval(Duration::from_millis(10)),
            )
            .with_settle(Duration::ZERO)
    }

    fn login_plan() -> TestPlan {
        TestPlan::new("login")
            .with_step(TestStep::goto("https://example.test"))
            .with_step(TestStep::click(SelectorKind::ById, "login"))
            .with_step(TestStep::input(SelectorKind::ById, "user", "alice"))
            .with_step(TestStep::assert(
                SelectorKind::ById,
                "banner",
                Some("Welcome".to_string()),
            ))
    }

    fn scripted_driver() -> MockDriver {
        let mut driver = MockDriver::new();
        driver.add_element(
            &Locator::new(SelectorKind::ById, "login"),
            MockElement::new("button"),
        );
        driver.add_element(
            &Locator::new(SelectorKind::ById, "user"),
            MockElement::new("input"),
        );
        driver.add_element(
            &Locator::new(SelectorKind::ById, "banner"),
            MockElement::new("div").with_text("Welcome, User"),
        );
        driver
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let mut driver = scripted_driver();
        let run = RunController::new(fast_config())
            .run(&login_plan(), &mut driver)
            .await;

        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.step_results.len(), 4);
        assert!(run
            .step_results
            .iter()
            .all(|r| r.status == StepStatus::Success));
        assert!(run.ended_at.unwrap() >= run.started_at);
        assert!(driver.was_called("close"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        // login button missing: click times out at step 2
        let mut driver = MockDriver::new();
        let run = RunController::new(fast_config())
            .run(&login_plan(), &mut driver)
            .await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_results.len(), 2);
        assert_eq!(run.step_results[0].status, StepStatus::Success);
        let failed = &run.step_results[1];
        assert_eq!(failed.status, StepStatus::Failed);
        assert!(failed.message.contains("byid=login"));
        assert!(failed.screenshot.is_some());
        assert!(!driver.was_called("find:byid=user"));
        assert!(driver.was_called("close"));
    }

    #[tokio::test]
    async fn test_navigation_error_becomes_failed_step_result() {
        let mut driver = scripted_driver();
        driver.fail_navigation();
        let run = RunController::new(fast_config())
            .run(&login_plan(), &mut driver)
            .await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_results.len(), 1);
        let failed = &run.step_results[0];
        assert_eq!(failed.status, StepStatus::Failed);
        assert!(failed.message.contains("Navigation"));
        assert!(failed.screenshot.is_some());
        assert!(run.log.contains("[ERROR]"));
        // fail-fast: the click never starts
        assert!(!driver.was_called("find:byid=login"));
        assert!(driver.was_called("close"));
    }

    #[tokio::test]
    async fn test_interaction_error_becomes_failed_step_result() {
        let mut driver = scripted_driver();
        driver.fail_interaction();
        driver.set_screenshot(vec![0xAB, 0xCD]);
        let run = RunController::new(fast_config())
            .run(&login_plan(), &mut driver)
            .await;

        assert_eq!(run.status, RunStatus::Failed);
        // goto succeeds, the click's interaction fails
        assert_eq!(run.step_results.len(), 2);
        let failed = &run.step_results[1];
        assert_eq!(failed.status, StepStatus::Failed);
        assert!(failed.message.contains("Interaction"));
        assert_eq!(failed.screenshot.as_deref(), Some(&[0xAB, 0xCD][..]));
        assert!(run.snapshot().has_error_screenshot);
    }

    #[tokio::test]
    async fn test_failed_run_log_explains_first_failure() {
        let mut driver = MockDriver::new();
        let run = RunController::new(fast_config())
            .run(&login_plan(), &mut driver)
            .await;

        assert!(!run.log.is_empty());
        assert!(run.log.contains("[STEP 2] ACTION: click"));
        assert!(run.log.contains("[ERROR]"));
    }

    #[tokio::test]
    async fn test_screenshot_capture_failure_is_swallowed() {
        let mut driver = MockDriver::new();
        driver.fail_screenshot();
        let run = RunController::new(fast_config())
            .run(&login_plan(), &mut driver)
            .await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_results.len(), 2);
        assert!(run.step_results[1].screenshot.is_none());
        assert!(run.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_manual_step_is_skipped_but_run_succeeds() {
        let plan = TestPlan::new("mixed")
            .with_step(TestStep::goto("https://example.test"))
            .with_step(TestStep::manual("confirm the email arrived"));
        let mut driver = MockDriver::new();
        let run = RunController::new(fast_config()).run(&plan, &mut driver).await;

        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.step_results[1].status, StepStatus::Skipped);
        assert!(run.log.contains("Skipped in automated run"));
    }

    #[tokio::test]
    async fn test_misordered_plan_is_run_level_failure() {
        let mut plan = login_plan();
        plan.steps[2].step_order = 9;
        let mut driver = scripted_driver();
        let run = RunController::new(fast_config()).run(&plan, &mut driver).await;

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.step_results.is_empty());
        assert!(run.error_screenshot.is_some());
        assert!(run.log.contains("[ERROR]"));
        assert!(run.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_plan_deadline_between_steps() {
        let plan = TestPlan::new("slow")
            .with_step(TestStep::wait_secs(0.1))
            .with_step(TestStep::wait_secs(0.1))
            .with_step(TestStep::goto("https://example.test"));
        let config = fast_config().with_plan_deadline(Duration::from_millis(50));
        let mut driver = MockDriver::new();
        let run = RunController::new(config).run(&plan, &mut driver).await;

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.log.contains("deadline"));
        // the goto after the deadline never runs
        assert!(!driver.was_called("navigate:"));
    }

    #[tokio::test]
    async fn test_spawned_run_polls_and_finishes() {
        let plan = TestPlan::new("poll")
            .with_step(TestStep::goto("https://example.test"))
            .with_step(TestStep::wait_secs(0.05));
        let handle = RunController::new(fast_config()).spawn(plan, Box::new(MockDriver::new()));

        let run = handle.wait().await;
        assert_eq!(run.status, RunStatus::Success);
        let snap = run.snapshot();
        assert!(snap.duration_ms.is_some());
        assert!(!snap.has_error_screenshot);
        assert!(snap.log.contains("[STEP 1] ACTION: goto"));
    }

    #[tokio::test]
    async fn test_cancellation_between_steps() {
        let plan = TestPlan::new("cancelled")
            .with_step(TestStep::wait_secs(0.2))
            .with_step(TestStep::goto("https://example.test"));
        let controller = RunController::new(fast_config());
        let handle = controller.spawn(plan, Box::new(MockDriver::new()));

        // cancel through a detached token, as an external caller would
        let token = handle.cancel_token();
        token.cancel();
        assert!(token.is_cancelled());

        let run = handle.wait().await;
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.log.contains("[CANCELLED]"));
        assert!(run.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_aborted_run_is_finalized() {
        let run = TestRun::aborted("no-browser", "browser could not be launched");
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.ended_at.is_some());
        assert!(run.log.contains("browser could not be launched"));
        assert!(!run.snapshot().has_error_screenshot);
    }

    #[test]
    fn test_run_status_terminality() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
