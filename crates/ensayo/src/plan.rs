//! Test plan data model: plans, steps, and the typed vocabulary of
//! actions, selector kinds, wait kinds, and select directives.
//!
//! A plan exclusively owns its steps. Step order is kept as a dense
//! `1..=N` sequence at rest; [`TestPlan::renumber`] restores the
//! invariant after authoring edits. Plans are read-only during
//! execution.

use serde::{Deserialize, Serialize};

use crate::result::{EnsayoError, EnsayoResult};

/// One declarative UI action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Navigate the session to a URL (`input_value`)
    Goto,
    /// Click the located element once it is clickable
    Click,
    /// Clear the located field and type `input_value` into it
    Input,
    /// Assert `input_value` is a substring of the element's text
    Assert,
    /// Choose an option in a select element (`input_value` directive)
    Select,
    /// Pause under a wait policy (`wait` kind)
    Wait,
    /// Scroll the located element into centered view
    Scrollto,
    /// Move the virtual pointer onto the located element
    Hover,
    /// Capture the current viewport as a PNG
    Screenshot,
    /// Human-only step, recorded as skipped in automated runs
    Manual,
}

impl Action {
    /// Parse an authored action word.
    ///
    /// Unrecognized words are a configuration error, never defaulted.
    pub fn parse(s: &str) -> EnsayoResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goto" => Ok(Self::Goto),
            "click" => Ok(Self::Click),
            "input" => Ok(Self::Input),
            "assert" => Ok(Self::Assert),
            "select" => Ok(Self::Select),
            "wait" => Ok(Self::Wait),
            "scrollto" => Ok(Self::Scrollto),
            "hover" => Ok(Self::Hover),
            "screenshot" => Ok(Self::Screenshot),
            "manual" => Ok(Self::Manual),
            other => Err(EnsayoError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }

    /// The authored wire word for this action
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Goto => "goto",
            Self::Click => "click",
            Self::Input => "input",
            Self::Assert => "assert",
            Self::Select => "select",
            Self::Wait => "wait",
            Self::Scrollto => "scrollto",
            Self::Hover => "hover",
            Self::Screenshot => "screenshot",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative selector kind, mapped to a driver-native lookup by the
/// locator resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorKind {
    /// Lookup by element id
    #[serde(rename = "byid")]
    ById,
    /// Lookup by XPath expression
    #[serde(rename = "byxpath")]
    ByXPath,
    /// Lookup by class name (first match)
    #[serde(rename = "byclass")]
    ByClass,
    /// Lookup by name attribute (first match)
    #[serde(rename = "byname")]
    ByName,
    /// Lookup by tag name (first match)
    #[serde(rename = "bytag")]
    ByTag,
    /// Lookup by CSS selector
    #[serde(rename = "bycss")]
    ByCss,
    /// Lookup by exact anchor text
    #[serde(rename = "bylinktext")]
    ByLinkText,
}

impl SelectorKind {
    /// Parse an authored selector kind, accepting both the compact
    /// (`byid`) and hyphenated (`by-id`) spellings.
    pub fn parse(s: &str) -> EnsayoResult<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        match normalized.as_str() {
            "byid" => Ok(Self::ById),
            "byxpath" => Ok(Self::ByXPath),
            "byclass" => Ok(Self::ByClass),
            "byname" => Ok(Self::ByName),
            "bytag" => Ok(Self::ByTag),
            "bycss" => Ok(Self::ByCss),
            "bylinktext" => Ok(Self::ByLinkText),
            _ => Err(EnsayoError::UnsupportedSelector {
                kind: s.to_string(),
            }),
        }
    }

    /// The authored wire word for this kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ById => "byid",
            Self::ByXPath => "byxpath",
            Self::ByClass => "byclass",
            Self::ByName => "byname",
            Self::ByTag => "bytag",
            Self::ByCss => "bycss",
            Self::ByLinkText => "bylinktext",
        }
    }
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wait policy kind for `wait` steps and action preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitKind {
    /// Sleep a fixed duration; never fails
    Time,
    /// Until the locator resolves to at least one attached node
    Element,
    /// Until the node is attached and has non-zero rendered size
    Visible,
    /// Until the node is visible and enabled for interaction
    Clickable,
}

impl WaitKind {
    /// The authored wire word for this kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Element => "element",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
        }
    }
}

impl std::fmt::Display for WaitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a `select` step picks its option.
///
/// Decoded once from the authored `value:` / `index:` prefixes at
/// plan-validation time instead of re-parsed per execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectDirective {
    /// Match the option's underlying `value` attribute
    ByValue(String),
    /// Match the zero-based option index
    ByIndex(usize),
    /// Match the option's visible text
    ByText(String),
}

impl SelectDirective {
    /// Decode an authored directive string.
    pub fn parse(raw: &str) -> EnsayoResult<Self> {
        if let Some(value) = raw.strip_prefix("value:") {
            return Ok(Self::ByValue(value.to_string()));
        }
        if let Some(index) = raw.strip_prefix("index:") {
            return index.trim().parse::<usize>().map(Self::ByIndex).map_err(|_| {
                EnsayoError::InvalidDirective {
                    value: raw.to_string(),
                }
            });
        }
        Ok(Self::ByText(raw.to_string()))
    }
}

impl std::fmt::Display for SelectDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByValue(v) => write!(f, "value:{v}"),
            Self::ByIndex(i) => write!(f, "index:{i}"),
            Self::ByText(t) => write!(f, "{t}"),
        }
    }
}

/// A selector kind + value pair as authored on a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// Selector kind
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    /// Selector value (id, expression, class, ...)
    pub value: String,
}

impl SelectorSpec {
    /// Create a new selector spec
    #[must_use]
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

/// One declarative test step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    /// Position within the plan, `1..=N`, unique
    pub step_order: u32,
    /// What this step does
    pub action: Action,
    /// Target element, required for all actions except
    /// goto/manual/screenshot and time-based waits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorSpec>,
    /// Action argument: URL for goto, text for input, expected
    /// substring for assert, select directive, wait duration in
    /// seconds, or a note for manual steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_value: Option<String>,
    /// Wait kind, required only for `action = wait`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<WaitKind>,
    /// Per-step override for the condition-wait timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
}

impl TestStep {
    fn bare(action: Action) -> Self {
        Self {
            step_order: 0,
            action,
            selector: None,
            input_value: None,
            wait: None,
            timeout_secs: None,
        }
    }

    /// A `goto` step navigating to `url`
    #[must_use]
    pub fn goto(url: impl Into<String>) -> Self {
        Self {
            input_value: Some(url.into()),
            ..Self::bare(Action::Goto)
        }
    }

    /// A `click` step on the given element
    #[must_use]
    pub fn click(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            ..Self::bare(Action::Click)
        }
    }

    /// An `input` step typing `text` into the given element
    #[must_use]
    pub fn input(kind: SelectorKind, value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            input_value: Some(text.into()),
            ..Self::bare(Action::Input)
        }
    }

    /// An `assert` step; `expected = None` asserts mere presence
    #[must_use]
    pub fn assert(
        kind: SelectorKind,
        value: impl Into<String>,
        expected: Option<String>,
    ) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            input_value: expected,
            ..Self::bare(Action::Assert)
        }
    }

    /// A `select` step with an authored directive (`value:`, `index:`
    /// or visible text)
    #[must_use]
    pub fn select(
        kind: SelectorKind,
        value: impl Into<String>,
        directive: impl Into<String>,
    ) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            input_value: Some(directive.into()),
            ..Self::bare(Action::Select)
        }
    }

    /// A time-based `wait` step sleeping `secs` seconds
    #[must_use]
    pub fn wait_secs(secs: f64) -> Self {
        Self {
            input_value: Some(secs.to_string()),
            wait: Some(WaitKind::Time),
            ..Self::bare(Action::Wait)
        }
    }

    /// A condition-based `wait` step on the given element
    #[must_use]
    pub fn wait_for(wait: WaitKind, kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            wait: Some(wait),
            ..Self::bare(Action::Wait)
        }
    }

    /// A `scrollto` step
    #[must_use]
    pub fn scrollto(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            ..Self::bare(Action::Scrollto)
        }
    }

    /// A `hover` step
    #[must_use]
    pub fn hover(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            selector: Some(SelectorSpec::new(kind, value)),
            ..Self::bare(Action::Hover)
        }
    }

    /// A viewport `screenshot` step
    #[must_use]
    pub fn screenshot() -> Self {
        Self::bare(Action::Screenshot)
    }

    /// A `manual` step with a note for the human tester
    #[must_use]
    pub fn manual(note: impl Into<String>) -> Self {
        Self {
            input_value: Some(note.into()),
            ..Self::bare(Action::Manual)
        }
    }

    /// Set the per-step condition-wait timeout
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// The step's selector, or a `MissingField` configuration error.
    pub fn require_selector(&self) -> EnsayoResult<&SelectorSpec> {
        self.selector.as_ref().ok_or(EnsayoError::MissingField {
            step_order: self.step_order,
            field: "selector",
        })
    }

    /// The step's input value, or a `MissingField` configuration error.
    pub fn require_input(&self) -> EnsayoResult<&str> {
        self.input_value
            .as_deref()
            .ok_or(EnsayoError::MissingField {
                step_order: self.step_order,
                field: "input_value",
            })
    }

    /// The wait duration in seconds for a time-based wait step.
    pub fn wait_duration_secs(&self) -> EnsayoResult<f64> {
        let raw = self.require_input()?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .ok_or_else(|| EnsayoError::InvalidDirective {
                value: raw.to_string(),
            })
    }

    /// Check that every field this step's action requires is present.
    ///
    /// A missing field is a reported configuration error, never a
    /// silent skip.
    pub fn validate(&self) -> EnsayoResult<()> {
        if self.step_order == 0 {
            return Err(EnsayoError::InvalidPlan {
                message: format!("step_order must be positive (action {})", self.action),
            });
        }
        match self.action {
            Action::Goto => {
                if self.require_input()?.trim().is_empty() {
                    return Err(EnsayoError::MissingField {
                        step_order: self.step_order,
                        field: "input_value",
                    });
                }
            }
            Action::Click | Action::Scrollto | Action::Hover | Action::Assert => {
                self.require_selector()?;
            }
            Action::Input => {
                self.require_selector()?;
                self.require_input()?;
            }
            Action::Select => {
                self.require_selector()?;
                SelectDirective::parse(self.require_input()?)?;
            }
            Action::Wait => match self.wait {
                None => {
                    return Err(EnsayoError::MissingField {
                        step_order: self.step_order,
                        field: "wait",
                    })
                }
                Some(WaitKind::Time) => {
                    self.wait_duration_secs()?;
                }
                Some(_) => {
                    self.require_selector()?;
                }
            },
            Action::Screenshot | Action::Manual => {}
        }
        Ok(())
    }
}

/// An ordered, exclusively owned collection of test steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Plan name, used in run narration
    pub name: String,
    /// Steps in ascending `step_order`
    #[serde(default)]
    pub steps: Vec<TestStep>,
}

impl TestPlan {
    /// Create an empty plan
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step, assigning it the next order slot.
    #[must_use]
    pub fn with_step(mut self, step: TestStep) -> Self {
        self.push_step(step);
        self
    }

    /// Append a step, assigning it the next order slot.
    pub fn push_step(&mut self, mut step: TestStep) {
        step.step_order = self.steps.len() as u32 + 1;
        self.steps.push(step);
    }

    /// Remove the step at `step_order`, renumbering the remainder so
    /// the dense `1..=N` invariant holds at rest.
    pub fn remove_step(&mut self, step_order: u32) -> Option<TestStep> {
        let idx = self.steps.iter().position(|s| s.step_order == step_order)?;
        let removed = self.steps.remove(idx);
        self.renumber();
        Some(removed)
    }

    /// Restore the dense `1..=N` step order, preserving relative order.
    pub fn renumber(&mut self) {
        self.steps.sort_by_key(|s| s.step_order);
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.step_order = i as u32 + 1;
        }
    }

    /// Check the dense `1..=N` step order invariant.
    pub fn validate_order(&self) -> EnsayoResult<()> {
        for (i, step) in self.steps.iter().enumerate() {
            let expected = i as u32 + 1;
            if step.step_order != expected {
                return Err(EnsayoError::InvalidPlan {
                    message: format!(
                        "step order must be dense 1..{}: found {} at position {}",
                        self.steps.len(),
                        step.step_order,
                        expected
                    ),
                });
            }
        }
        Ok(())
    }

    /// Validate the plan: dense unique step order plus every step's
    /// per-action field requirements.
    pub fn validate(&self) -> EnsayoResult<()> {
        self.validate_order()?;
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }

    /// Parse a plan from JSON.
    pub fn from_json(json: &str) -> EnsayoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a plan from YAML.
    pub fn from_yaml(yaml: &str) -> EnsayoResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Serialize the plan to pretty JSON.
    pub fn to_json(&self) -> EnsayoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
