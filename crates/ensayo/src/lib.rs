//! Ensayo: Rust-Native Execution Engine for Browser UI Test Plans
//!
//! Ensayo (Spanish: "rehearsal") executes ordered, declarative test
//! plans against a live browser session and records a complete,
//! pollable run report with screenshot evidence on failure.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     ENSAYO Architecture                        │
//! ├────────────────────────────────────────────────────────────────┤
//! │   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐ │
//! │   │ TestPlan │   │ Run        │   │ Action   │   │ Driver   │ │
//! │   │ (steps)  │──►│ Controller │──►│ Dispatch │──►│ (CDP or  │ │
//! │   │          │   │ (state)    │   │ (waits)  │   │  mock)   │ │
//! │   └──────────┘   └────────────┘   └──────────┘   └──────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

#[cfg(feature = "browser")]
mod chromium;
mod dispatch;
mod driver;
mod locator;
mod plan;
mod result;
mod runner;
mod wait;

#[cfg(feature = "browser")]
pub use chromium::ChromiumSession;
pub use dispatch::{Dispatcher, StepOutcome, StepStatus, DEFAULT_SETTLE_MS};
pub use driver::{Driver, ElementHandle, MockDriver, MockElement, SessionConfig, MOCK_PNG};
pub use locator::Locator;
pub use plan::{Action, SelectDirective, SelectorKind, SelectorSpec, TestPlan, TestStep, WaitKind};
pub use result::{EnsayoError, EnsayoResult};
pub use runner::{
    CancelToken, RunConfig, RunController, RunHandle, RunSnapshot, RunStatus, TestRun,
    TestStepResult,
};
pub use wait::{WaitPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
