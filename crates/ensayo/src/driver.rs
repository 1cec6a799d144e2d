//! Abstract browser driver trait.
//!
//! The engine never talks to a concrete browser API; it drives this
//! trait. Implementations:
//!
//! - `ChromiumSession` - CDP via chromiumoxide (requires the `browser`
//!   feature)
//! - [`MockDriver`] - scripted DOM for unit and integration tests
//!
//! The trait abstraction protects the engine against CDP API
//! instability and keeps every engine code path testable without a
//! browser binary.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::locator::Locator;
use crate::plan::SelectDirective;
use crate::result::{EnsayoError, EnsayoResult};

/// A handle to one located DOM element.
///
/// The handle carries the locator it was resolved from; drivers
/// re-resolve on each interaction, so a handle never goes stale across
/// client-side re-renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    locator: Locator,
}

impl ElementHandle {
    /// Create a handle for a located element
    #[must_use]
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }

    /// The locator this handle was resolved from
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }
}

/// Browser session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// User agent string
    pub user_agent: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chromium_path: None,
            sandbox: true,
            user_agent: None,
        }
    }
}

impl SessionConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set chromium executable path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable the sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }
}

/// Abstract driver for one exclusively owned browser session.
///
/// One run controller owns one driver for its whole lifetime; drivers
/// are never shared across concurrent runs.
#[async_trait]
pub trait Driver: Send {
    /// Navigate to a URL
    async fn navigate(&mut self, url: &str) -> EnsayoResult<()>;

    /// Resolve a locator to an element handle, `None` if not attached
    async fn find(&mut self, locator: &Locator) -> EnsayoResult<Option<ElementHandle>>;

    /// Dispatch a click at the element
    async fn click(&mut self, element: &ElementHandle) -> EnsayoResult<()>;

    /// Clear a field's current value
    async fn clear(&mut self, element: &ElementHandle) -> EnsayoResult<()>;

    /// Type text into the element
    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> EnsayoResult<()>;

    /// Choose a select element's option by the given directive
    async fn select_option(
        &mut self,
        element: &ElementHandle,
        directive: &SelectDirective,
    ) -> EnsayoResult<()>;

    /// Scroll the element into centered view
    async fn scroll_into_view(&mut self, element: &ElementHandle) -> EnsayoResult<()>;

    /// Move the virtual pointer onto the element
    async fn hover(&mut self, element: &ElementHandle) -> EnsayoResult<()>;

    /// Read the element's text content
    async fn text(&mut self, element: &ElementHandle) -> EnsayoResult<String>;

    /// Whether the element has non-zero rendered size and visibility
    async fn is_visible(&mut self, element: &ElementHandle) -> EnsayoResult<bool>;

    /// Whether the element is enabled for interaction
    async fn is_enabled(&mut self, element: &ElementHandle) -> EnsayoResult<bool>;

    /// Capture the current viewport as PNG bytes
    async fn screenshot(&mut self) -> EnsayoResult<Vec<u8>>;

    /// Release the session
    async fn close(&mut self) -> EnsayoResult<()>;
}

// ============================================================================
// Mock driver
// ============================================================================

/// PNG magic bytes, enough for "a screenshot was captured" assertions.
pub const MOCK_PNG: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// A scripted DOM element for [`MockDriver`].
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Element tag name
    pub tag: String,
    /// Element text content
    pub text: String,
    /// Whether the element has rendered size
    pub visible: bool,
    /// Whether the element is enabled
    pub enabled: bool,
}

impl MockElement {
    /// Create a visible, enabled element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: String::new(),
            visible: true,
            enabled: true,
        }
    }

    /// Set the element's text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Mark the element attached but not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark the element disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Scripted driver for tests: a flat map of locator -> element plus a
/// call history for verification.
#[derive(Debug, Default)]
pub struct MockDriver {
    elements: HashMap<String, MockElement>,
    appear_after_polls: HashMap<String, u32>,
    /// Current URL after the last navigate
    pub current_url: String,
    /// Ordered record of driver calls for verification
    pub history: Vec<String>,
    /// Text typed per element, keyed by locator description
    pub typed: HashMap<String, String>,
    /// Directives applied per select element, keyed by locator description
    pub selected: HashMap<String, String>,
    screenshot_data: Option<Vec<u8>>,
    fail_navigation: bool,
    fail_screenshot: bool,
    fail_interaction: bool,
}

impl MockDriver {
    /// Create an empty mock session
    #[must_use]
    pub fn new() -> Self {
        Self {
            screenshot_data: Some(MOCK_PNG.to_vec()),
            ..Self::default()
        }
    }

    /// Script an element for the given locator
    pub fn add_element(&mut self, locator: &Locator, element: MockElement) {
        self.elements.insert(locator.describe(), element);
    }

    /// Script an element that only becomes attached after `polls`
    /// lookups, to exercise wait polling.
    pub fn add_element_after(&mut self, locator: &Locator, element: MockElement, polls: u32) {
        self.elements.insert(locator.describe(), element);
        self.appear_after_polls.insert(locator.describe(), polls);
    }

    /// Make navigation fail with a driver error
    pub fn fail_navigation(&mut self) {
        self.fail_navigation = true;
    }

    /// Make screenshot capture fail
    pub fn fail_screenshot(&mut self) {
        self.fail_screenshot = true;
        self.screenshot_data = None;
    }

    /// Make element interactions fail with a driver error
    pub fn fail_interaction(&mut self) {
        self.fail_interaction = true;
    }

    /// Replace the scripted screenshot bytes
    pub fn set_screenshot(&mut self, data: Vec<u8>) {
        self.screenshot_data = Some(data);
    }

    /// Whether a call starting with `prefix` was recorded
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.history.iter().any(|c| c.starts_with(prefix))
    }

    fn interaction_guard(&self) -> EnsayoResult<()> {
        if self.fail_interaction {
            return Err(EnsayoError::Interaction {
                message: "mock interaction failure".to_string(),
            });
        }
        Ok(())
    }

    fn element(&self, handle: &ElementHandle) -> EnsayoResult<&MockElement> {
        self.elements
            .get(&handle.locator().describe())
            .ok_or_else(|| EnsayoError::Interaction {
                message: format!("stale element: {}", handle.locator()),
            })
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&mut self, url: &str) -> EnsayoResult<()> {
        self.history.push(format!("navigate:{url}"));
        if self.fail_navigation {
            return Err(EnsayoError::Navigation {
                url: url.to_string(),
                message: "mock navigation failure".to_string(),
            });
        }
        self.current_url = url.to_string();
        Ok(())
    }

    async fn find(&mut self, locator: &Locator) -> EnsayoResult<Option<ElementHandle>> {
        let key = locator.describe();
        self.history.push(format!("find:{key}"));
        if let Some(remaining) = self.appear_after_polls.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        Ok(self
            .elements
            .contains_key(&key)
            .then(|| ElementHandle::new(locator.clone())))
    }

    async fn click(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.history.push(format!("click:{}", element.locator()));
        self.interaction_guard()?;
        self.element(element)?;
        Ok(())
    }

    async fn clear(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.history.push(format!("clear:{}", element.locator()));
        self.interaction_guard()?;
        self.typed.remove(&element.locator().describe());
        Ok(())
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> EnsayoResult<()> {
        self.history
            .push(format!("type:{}:{text}", element.locator()));
        self.interaction_guard()?;
        self.element(element)?;
        self.typed
            .insert(element.locator().describe(), text.to_string());
        Ok(())
    }

    async fn select_option(
        &mut self,
        element: &ElementHandle,
        directive: &SelectDirective,
    ) -> EnsayoResult<()> {
        self.history
            .push(format!("select:{}:{directive}", element.locator()));
        self.interaction_guard()?;
        self.element(element)?;
        self.selected
            .insert(element.locator().describe(), directive.to_string());
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.history.push(format!("scroll:{}", element.locator()));
        self.interaction_guard()?;
        self.element(element)?;
        Ok(())
    }

    async fn hover(&mut self, element: &ElementHandle) -> EnsayoResult<()> {
        self.history.push(format!("hover:{}", element.locator()));
        self.interaction_guard()?;
        self.element(element)?;
        Ok(())
    }

    async fn text(&mut self, element: &ElementHandle) -> EnsayoResult<String> {
        self.interaction_guard()?;
        Ok(self.element(element)?.text.clone())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> EnsayoResult<bool> {
        Ok(self.element(element)?.visible)
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> EnsayoResult<bool> {
        Ok(self.element(element)?.enabled)
    }

    async fn screenshot(&mut self) -> EnsayoResult<Vec<u8>> {
        self.history.push("screenshot".to_string());
        if self.fail_screenshot {
            return Err(EnsayoError::Screenshot {
                message: "mock screenshot failure".to_string(),
            });
        }
        Ok(self.screenshot_data.clone().unwrap_or_default())
    }

    async fn close(&mut self) -> EnsayoResult<()> {
        self.history.push("close".to_string());
        Ok(())
    }
}
