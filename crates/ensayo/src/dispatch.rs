//! Action dispatcher: executes one step against the driver session.
//!
//! One arm per action kind. Element-targeting actions acquire their
//! precondition through the shared wait policy, then perform the
//! effect. Each browser-touching arm ends with a settle delay to
//! tolerate client-side re-renders; the delay is an explicit
//! configuration knob (zero in tests) rather than a hidden constant.

use std::time::Duration;

use tracing::debug;

use crate::driver::{Driver, ElementHandle};
use crate::locator::Locator;
use crate::plan::{Action, SelectDirective, TestStep, WaitKind};
use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::WaitPolicy;

/// Terminal status of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The step's effect completed and its postcondition held
    Success,
    /// The step failed; the run stops after recording it
    Failed,
    /// Manual step, not executable in an automated run
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Outcome of dispatching one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Success or skipped; failures are reported as errors and
    /// converted by the run controller
    pub status: StepStatus,
    /// Narrated outcome line for the run log
    pub message: String,
    /// PNG bytes when the action was `screenshot`
    pub screenshot: Option<Vec<u8>>,
}

impl StepOutcome {
    fn success(message: String) -> Self {
        Self {
            status: StepStatus::Success,
            message,
            screenshot: None,
        }
    }

    fn skipped(message: String) -> Self {
        Self {
            status: StepStatus::Skipped,
            message,
            screenshot: None,
        }
    }
}

/// Default settle delay after browser-touching actions (1 second)
pub const DEFAULT_SETTLE_MS: u64 = 1_000;

/// Executes single steps under a wait policy and settle delay.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    waits: WaitPolicy,
    settle: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            waits: WaitPolicy::default(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }
}

impl Dispatcher {
    /// Create a dispatcher with explicit wait policy and settle delay
    #[must_use]
    pub const fn new(waits: WaitPolicy, settle: Duration) -> Self {
        Self { waits, settle }
    }

    /// Execute one step.
    ///
    /// `Ok` carries a success or skipped outcome; every failure mode
    /// (configuration error, wait timeout, assertion failure, driver
    /// error) is returned as `Err` for the run controller's single
    /// failure-handling routine. No persistence happens here.
    pub async fn execute(
        &self,
        step: &TestStep,
        driver: &mut dyn Driver,
    ) -> EnsayoResult<StepOutcome> {
        step.validate()?;
        debug!(step = step.step_order, action = %step.action, "dispatching step");

        let timeout = step.timeout_secs.map(Duration::from_secs_f64);
        let outcome = match step.action {
            Action::Goto => {
                let url = step.require_input()?.trim().to_string();
                driver.navigate(&url).await?;
                StepOutcome::success(format!("→ Navigated to: {url}"))
            }
            Action::Click => {
                let locator = Locator::from_spec(step.require_selector()?);
                let element = self
                    .waits
                    .acquire(driver, &locator, WaitKind::Clickable, timeout)
                    .await?;
                driver.click(&element).await?;
                StepOutcome::success(format!("→ Clicked: {locator}"))
            }
            Action::Input => {
                let text = step.require_input()?.to_string();
                let (locator, element) = self.present(step, driver, timeout).await?;
                driver.clear(&element).await?;
                driver.type_text(&element, &text).await?;
                StepOutcome::success(format!("→ Input: '{text}' into {locator}"))
            }
            Action::Assert => {
                let (locator, element) = self.present(step, driver, timeout).await?;
                match step.input_value.as_deref().filter(|v| !v.is_empty()) {
                    Some(expected) => {
                        let actual = driver.text(&element).await?;
                        if !actual.contains(expected) {
                            return Err(EnsayoError::AssertionFailed {
                                expected: expected.to_string(),
                                actual,
                            });
                        }
                        StepOutcome::success(format!("→ Asserted text '{expected}' in {locator}"))
                    }
                    None => StepOutcome::success(format!("→ Asserted presence of {locator}")),
                }
            }
            Action::Select => {
                let directive = SelectDirective::parse(step.require_input()?)?;
                let (locator, element) = self.present(step, driver, timeout).await?;
                driver.select_option(&element, &directive).await?;
                StepOutcome::success(format!("→ Selected '{directive}' in {locator}"))
            }
            Action::Wait => match step.wait.ok_or(EnsayoError::MissingField {
                step_order: step.step_order,
                field: "wait",
            })? {
                WaitKind::Time => {
                    let secs = step.wait_duration_secs()?;
                    self.waits.pause(Duration::from_secs_f64(secs)).await;
                    return Ok(StepOutcome::success(format!("→ Waited {secs}s")));
                }
                kind => {
                    let locator = Locator::from_spec(step.require_selector()?);
                    self.waits.acquire(driver, &locator, kind, timeout).await?;
                    return Ok(StepOutcome::success(format!(
                        "→ Waited until {locator} was {kind}"
                    )));
                }
            },
            Action::Scrollto => {
                let (locator, element) = self.present(step, driver, timeout).await?;
                driver.scroll_into_view(&element).await?;
                StepOutcome::success(format!("→ Scrolled to: {locator}"))
            }
            Action::Hover => {
                let (locator, element) = self.present(step, driver, timeout).await?;
                driver.hover(&element).await?;
                StepOutcome::success(format!("→ Hovered over: {locator}"))
            }
            Action::Screenshot => {
                let png = driver.screenshot().await?;
                let mut outcome =
                    StepOutcome::success(format!("→ Captured screenshot ({} bytes)", png.len()));
                outcome.screenshot = Some(png);
                outcome
            }
            Action::Manual => {
                let note = step.input_value.as_deref().unwrap_or("Manual step");
                return Ok(StepOutcome::skipped(format!(
                    "[MANUAL] {note} - Skipped in automated run"
                )));
            }
        };

        if !self.settle.is_zero() {
            self.waits.pause(self.settle).await;
        }
        Ok(outcome)
    }

    /// Acquire the step's element under the `element` presence wait.
    async fn present(
        &self,
        step: &TestStep,
        driver: &mut dyn Driver,
        timeout: Option<Duration>,
    ) -> EnsayoResult<(Locator, ElementHandle)> {
        let locator = Locator::from_spec(step.require_selector()?);
        let element = self
            .waits
            .acquire(driver, &locator, WaitKind::Element, timeout)
            .await?;
        Ok((locator, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement, MOCK_PNG};
    use crate::plan::SelectorKind;

    fn dispatcher() -> Dispatcher {
        let waits = WaitPolicy::new()
            .with_timeout(Duration::from_millis(150))
            .with_poll_interval(Duration::from_millis(10));
        Dispatcher::new(waits, Duration::ZERO)
    }

    fn numbered(mut step: TestStep, order: u32) -> TestStep {
        step.step_order = order;
        step
    }

    #[tokio::test]
    async fn test_goto_navigates_and_narrates() {
        let mut driver = MockDriver::new();
        let step = numbered(TestStep::goto("  https://example.test "), 1);

        let outcome = dispatcher().execute(&step, &mut driver).await.unwrap();
        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.message, "→ Navigated to: https://example.test");
        assert_eq!(driver.current_url, "https://example.test");
    }

    #[tokio::test]
    async fn test_click_waits_for_clickable() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "login");
        driver.add_element_after(&locator, MockElement::new("button"), 2);
        let step = numbered(TestStep::click(SelectorKind::ById, "login"), 1);

        let outcome = dispatcher().execute(&step, &mut driver).await.unwrap();
        assert_eq!(outcome.message, "→ Clicked: byid=login");
        assert!(driver.was_called("click:byid=login"));
    }

    #[tokio::test]
    async fn test_click_missing_target_times_out() {
        let mut driver = MockDriver::new();
        let step = numbered(TestStep::click(SelectorKind::ById, "gone"), 1);

        let err = dispatcher().execute(&step, &mut driver).await.unwrap_err();
        assert!(matches!(err, EnsayoError::WaitTimeout { .. }));
    }

    #[tokio::test]
    async fn test_input_clears_before_typing() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "user");
        driver.add_element(&locator, MockElement::new("input"));
        let step = numbered(TestStep::input(SelectorKind::ById, "user", "alice"), 1);

        dispatcher().execute(&step, &mut driver).await.unwrap();
        let clear_at = driver.history.iter().position(|c| c.starts_with("clear:")).unwrap();
        let type_at = driver.history.iter().position(|c| c.starts_with("type:")).unwrap();
        assert!(clear_at < type_at);
        assert_eq!(driver.typed.get("byid=user").map(String::as_str), Some("alice"));
    }

    #[tokio::test]
    async fn test_assert_substring_semantics() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "banner");
        driver.add_element(&locator, MockElement::new("div").with_text("Welcome, User"));

        let pass = numbered(
            TestStep::assert(SelectorKind::ById, "banner", Some("Welcome".to_string())),
            1,
        );
        let outcome = dispatcher().execute(&pass, &mut driver).await.unwrap();
        assert_eq!(outcome.message, "→ Asserted text 'Welcome' in byid=banner");
    }

    #[tokio::test]
    async fn test_assert_failure_carries_expected_and_actual() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "banner");
        driver.add_element(&locator, MockElement::new("div").with_text("Goodbye"));

        let step = numbered(
            TestStep::assert(SelectorKind::ById, "banner", Some("Welcome".to_string())),
            1,
        );
        let err = dispatcher().execute(&step, &mut driver).await.unwrap_err();
        match err {
            EnsayoError::AssertionFailed { expected, actual } => {
                assert_eq!(expected, "Welcome");
                assert_eq!(actual, "Goodbye");
            }
            other => panic!("expected AssertionFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_assert_without_expected_checks_presence_only() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "banner");
        driver.add_element(&locator, MockElement::new("div").with_text("anything"));

        let step = numbered(TestStep::assert(SelectorKind::ById, "banner", None), 1);
        let outcome = dispatcher().execute(&step, &mut driver).await.unwrap();
        assert_eq!(outcome.message, "→ Asserted presence of byid=banner");
    }

    #[tokio::test]
    async fn test_select_by_value_ignores_label() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "country");
        driver.add_element(&locator, MockElement::new("select"));

        let step = numbered(
            TestStep::select(SelectorKind::ById, "country", "value:US"),
            1,
        );
        dispatcher().execute(&step, &mut driver).await.unwrap();
        assert_eq!(
            driver.selected.get("byid=country").map(String::as_str),
            Some("value:US")
        );
    }

    #[tokio::test]
    async fn test_time_wait_blocks_for_duration() {
        let mut driver = MockDriver::new();
        let step = numbered(TestStep::wait_secs(0.5), 1);

        let start = std::time::Instant::now();
        let outcome = dispatcher().execute(&step, &mut driver).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(outcome.status, StepStatus::Success);
    }

    #[tokio::test]
    async fn test_scroll_and_hover() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ByCss, "#footer");
        driver.add_element(&locator, MockElement::new("div"));

        let scroll = numbered(TestStep::scrollto(SelectorKind::ByCss, "#footer"), 1);
        let hover = numbered(TestStep::hover(SelectorKind::ByCss, "#footer"), 2);
        dispatcher().execute(&scroll, &mut driver).await.unwrap();
        dispatcher().execute(&hover, &mut driver).await.unwrap();
        assert!(driver.was_called("scroll:bycss=#footer"));
        assert!(driver.was_called("hover:bycss=#footer"));
    }

    #[tokio::test]
    async fn test_screenshot_attaches_image() {
        let mut driver = MockDriver::new();
        let step = numbered(TestStep::screenshot(), 1);

        let outcome = dispatcher().execute(&step, &mut driver).await.unwrap();
        assert_eq!(outcome.screenshot.as_deref().map(|d| &d[..4]), Some(&MOCK_PNG[..]));
    }

    #[tokio::test]
    async fn test_manual_is_skipped_not_failed() {
        let mut driver = MockDriver::new();
        let step = numbered(TestStep::manual("verify the PDF by hand"), 1);

        let outcome = dispatcher().execute(&step, &mut driver).await.unwrap();
        assert_eq!(outcome.status, StepStatus::Skipped);
        assert_eq!(
            outcome.message,
            "[MANUAL] verify the PDF by hand - Skipped in automated run"
        );
        assert!(driver.history.is_empty());
    }

    #[tokio::test]
    async fn test_misconfigured_step_is_reported_not_skipped() {
        let mut driver = MockDriver::new();
        let mut step = numbered(TestStep::click(SelectorKind::ById, "x"), 1);
        step.selector = None;

        let err = dispatcher().execute(&step, &mut driver).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_settle_delay_applies_after_action() {
        let mut driver = MockDriver::new();
        let locator = Locator::new(SelectorKind::ById, "b");
        driver.add_element(&locator, MockElement::new("button"));
        let step = numbered(TestStep::click(SelectorKind::ById, "b"), 1);

        let settled = Dispatcher::new(
            WaitPolicy::new().with_poll_interval(Duration::from_millis(5)),
            Duration::from_millis(80),
        );
        let start = std::time::Instant::now();
        settled.execute(&step, &mut driver).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
