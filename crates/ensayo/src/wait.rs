//! Wait policy: how long and under what condition the engine pauses.
//!
//! Condition-based waits are the principal source of flakiness in
//! browser automation, so all of them go through one polling
//! primitive, [`WaitPolicy::acquire`], instead of being re-implemented
//! per action.

use std::time::Duration;

use tokio::time::Instant;

use crate::driver::{Driver, ElementHandle};
use crate::locator::Locator;
use crate::plan::WaitKind;
use crate::result::{EnsayoError, EnsayoResult};

/// Default timeout for condition-based waits (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Bounded polling policy shared by every action's precondition wait.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    /// Timeout for condition-based waits
    pub timeout: Duration,
    /// Polling interval
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitPolicy {
    /// Create a policy with the default bounds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the condition-wait timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sleep a fixed duration. Never fails.
    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Block until `kind` holds for the located element, or the bound
    /// elapses.
    ///
    /// The condition is checked once immediately, so a zero timeout
    /// still observes an already-satisfied condition. `override_timeout`
    /// is the per-step bound; `None` uses the policy default.
    pub async fn acquire(
        &self,
        driver: &mut dyn Driver,
        locator: &Locator,
        kind: WaitKind,
        override_timeout: Option<Duration>,
    ) -> EnsayoResult<ElementHandle> {
        let timeout = override_timeout.unwrap_or(self.timeout);
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(handle) = driver.find(locator).await? {
                let satisfied = match kind {
                    // Time waits never reach acquire; presence is enough
                    WaitKind::Time | WaitKind::Element => true,
                    WaitKind::Visible => driver.is_visible(&handle).await?,
                    WaitKind::Clickable => {
                        driver.is_visible(&handle).await? && driver.is_enabled(&handle).await?
                    }
                };
                if satisfied {
                    return Ok(handle);
                }
            }

            if Instant::now() >= deadline {
                return Err(EnsayoError::WaitTimeout {
                    wait: kind,
                    selector: locator.kind(),
                    value: locator.value().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
