//! BrowserDriver - Abstract Browser Automation Trait
//!
//! Stages never talk to a browser directly. They consume the capability set
//! below and treat any failure as an ordinary error to be caught at the check
//! or stage boundary.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  BrowserDriver (Abstract Trait)                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐      ┌─────────────────────────┐   │
//! │  │  ChromiumDriver     │      │  ScriptedDriver         │   │
//! │  │  (feature browser)  │      │  (unit tests)           │   │
//! │  │  CDP via            │      │  canned script results, │   │
//! │  │  chromiumoxide      │      │  injectable failures    │   │
//! │  └─────────────────────┘      └─────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One session, one page at a time: `new_page` replaces whatever page was
//! open before.

use crate::result::{PreflightError, PreflightResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::Duration;

/// Named viewport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Viewport name used in baseline keys (e.g. `mobile`)
    pub name: String,
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
    /// Emulate a touch/mobile device
    #[serde(default)]
    pub mobile: bool,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            mobile: false,
        }
    }

    /// Mark as a mobile viewport
    #[must_use]
    pub const fn mobile(mut self) -> Self {
        self.mobile = true;
        self
    }
}

/// Preferred colour scheme emulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// `prefers-color-scheme: light`
    Light,
    /// `prefers-color-scheme: dark`
    Dark,
}

impl ColorScheme {
    /// CSS media feature value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screenshot data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
}

impl Screenshot {
    /// Wrap PNG bytes
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the screenshot carries data
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Browser automation capability consumed by every stage
#[async_trait]
pub trait BrowserDriver: Send {
    /// Open a fresh page with the given viewport, closing any previous page
    async fn new_page(&mut self, viewport: &Viewport) -> PreflightResult<()>;

    /// Override the user agent of the current page
    async fn set_user_agent(&mut self, user_agent: &str) -> PreflightResult<()>;

    /// Navigate the current page
    async fn goto(&mut self, url: &str) -> PreflightResult<()>;

    /// Wait until `selector` matches an element
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration)
        -> PreflightResult<()>;

    /// Click the first element matching `selector`
    async fn click(&mut self, selector: &str) -> PreflightResult<()>;

    /// Press a key on the focused element
    async fn keyboard_press(&mut self, key: &str) -> PreflightResult<()>;

    /// Evaluate a JavaScript expression; promises are awaited
    async fn evaluate(&mut self, script: &str) -> PreflightResult<serde_json::Value>;

    /// Capture the viewport
    async fn screenshot(&mut self) -> PreflightResult<Screenshot>;

    /// Capture a single element
    async fn element_screenshot(&mut self, selector: &str) -> PreflightResult<Screenshot>;

    /// Emulate `prefers-color-scheme`
    async fn emulate_color_scheme(&mut self, scheme: ColorScheme) -> PreflightResult<()>;

    /// Close the current page
    async fn close_page(&mut self) -> PreflightResult<()>;

    /// Close the browser session
    async fn close(&mut self) -> PreflightResult<()>;
}

/// Failure injected into a [`ScriptedDriver`] call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptedFailure {
    /// `goto` to this URL fails
    Goto(String),
    /// `wait_for_selector`/`click`/`element_screenshot` on this selector fails
    Selector(String),
    /// `evaluate` of this exact script fails
    Script(String),
    /// `screenshot` fails
    Screenshot,
    /// `new_page` fails
    NewPage,
    /// `close` fails
    Close,
}

/// Scripted driver for unit testing
///
/// Script results are keyed by the exact script text; queued results are
/// consumed in order and the last one repeats.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    /// Current URL
    pub current_url: String,
    /// Current viewport
    pub viewport: Option<Viewport>,
    /// Current colour scheme
    pub color_scheme: Option<ColorScheme>,
    /// Current user agent override
    pub user_agent: Option<String>,
    /// Selectors considered present on every page
    selectors: HashSet<String>,
    /// Canned script results
    scripts: HashMap<String, VecDeque<serde_json::Value>>,
    /// Canned screenshots, keyed by viewport name then colour scheme
    screenshots: HashMap<String, Vec<u8>>,
    /// Fallback screenshot
    default_screenshot: Option<Vec<u8>>,
    /// Injected failures
    failures: HashSet<ScriptedFailure>,
    /// Call history for verification
    pub call_history: Vec<String>,
}

impl ScriptedDriver {
    /// Create new scripted driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a selector as present
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.insert(selector.into());
        self
    }

    /// Queue a result for an exact script
    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>, value: serde_json::Value) -> Self {
        self.push_script(script, value);
        self
    }

    /// Queue a result for an exact script
    pub fn push_script(&mut self, script: impl Into<String>, value: serde_json::Value) {
        self.scripts.entry(script.into()).or_default().push_back(value);
    }

    /// Replace every queued result for a script with `value`
    #[must_use]
    pub fn overriding(mut self, script: impl Into<String>, value: serde_json::Value) -> Self {
        self.scripts.insert(script.into(), VecDeque::from([value]));
        self
    }

    /// Screenshot returned whenever no viewport-specific one is set
    #[must_use]
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.default_screenshot = Some(png);
        self
    }

    /// Screenshot returned for a viewport name (and optional colour scheme,
    /// keyed as `name@dark`)
    #[must_use]
    pub fn with_screenshot_for(mut self, key: impl Into<String>, png: Vec<u8>) -> Self {
        self.screenshots.insert(key.into(), png);
        self
    }

    /// Inject a failure
    #[must_use]
    pub fn failing(mut self, failure: ScriptedFailure) -> Self {
        self.failures.insert(failure);
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    /// Count calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn fails(&self, failure: &ScriptedFailure) -> bool {
        self.failures.contains(failure)
    }

    fn selector_ready(&self, selector: &str) -> PreflightResult<()> {
        if self.fails(&ScriptedFailure::Selector(selector.to_string()))
            || !self.selectors.contains(selector)
        {
            return Err(PreflightError::element(selector, "no matching element"));
        }
        Ok(())
    }

    fn screenshot_bytes(&self) -> PreflightResult<Vec<u8>> {
        let viewport = self.viewport.as_ref().map(|v| v.name.as_str()).unwrap_or("");
        let themed = self
            .color_scheme
            .map(|scheme| format!("{viewport}@{scheme}"));
        themed
            .and_then(|key| self.screenshots.get(&key))
            .or_else(|| self.screenshots.get(viewport))
            .or(self.default_screenshot.as_ref())
            .cloned()
            .ok_or_else(|| PreflightError::ScreenshotError {
                message: "No scripted screenshot set".to_string(),
            })
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn new_page(&mut self, viewport: &Viewport) -> PreflightResult<()> {
        self.call_history.push(format!("new_page:{}", viewport.name));
        if self.fails(&ScriptedFailure::NewPage) {
            return Err(PreflightError::PageError {
                message: "scripted new_page failure".to_string(),
            });
        }
        self.viewport = Some(viewport.clone());
        self.color_scheme = None;
        self.user_agent = None;
        self.current_url = "about:blank".to_string();
        Ok(())
    }

    async fn set_user_agent(&mut self, user_agent: &str) -> PreflightResult<()> {
        self.call_history.push(format!("set_user_agent:{user_agent}"));
        self.user_agent = Some(user_agent.to_string());
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> PreflightResult<()> {
        self.call_history.push(format!("goto:{url}"));
        if self.fails(&ScriptedFailure::Goto(url.to_string())) {
            return Err(PreflightError::NavigationError {
                url: url.to_string(),
                message: "scripted navigation failure".to_string(),
            });
        }
        self.current_url = url.to_string();
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> PreflightResult<()> {
        self.call_history.push(format!("wait_for_selector:{selector}"));
        self.selector_ready(selector).map_err(|_| PreflightError::Timeout {
            ms: timeout.as_millis() as u64,
        })
    }

    async fn click(&mut self, selector: &str) -> PreflightResult<()> {
        self.call_history.push(format!("click:{selector}"));
        self.selector_ready(selector)
    }

    async fn keyboard_press(&mut self, key: &str) -> PreflightResult<()> {
        self.call_history.push(format!("keyboard_press:{key}"));
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> PreflightResult<serde_json::Value> {
        self.call_history.push("evaluate".to_string());
        if self.fails(&ScriptedFailure::Script(script.to_string())) {
            return Err(PreflightError::script("scripted evaluation failure"));
        }
        let queue = self
            .scripts
            .get_mut(script)
            .ok_or_else(|| PreflightError::script("No scripted result set"))?;
        let value = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        value.ok_or_else(|| PreflightError::script("No scripted result set"))
    }

    async fn screenshot(&mut self) -> PreflightResult<Screenshot> {
        self.call_history.push("screenshot".to_string());
        if self.fails(&ScriptedFailure::Screenshot) {
            return Err(PreflightError::ScreenshotError {
                message: "scripted screenshot failure".to_string(),
            });
        }
        self.screenshot_bytes().map(Screenshot::new)
    }

    async fn element_screenshot(&mut self, selector: &str) -> PreflightResult<Screenshot> {
        self.call_history.push(format!("element_screenshot:{selector}"));
        self.selector_ready(selector)?;
        self.screenshot_bytes().map(Screenshot::new)
    }

    async fn emulate_color_scheme(&mut self, scheme: ColorScheme) -> PreflightResult<()> {
        self.call_history.push(format!("emulate_color_scheme:{scheme}"));
        self.color_scheme = Some(scheme);
        Ok(())
    }

    async fn close_page(&mut self) -> PreflightResult<()> {
        self.call_history.push("close_page".to_string());
        Ok(())
    }

    async fn close(&mut self) -> PreflightResult<()> {
        self.call_history.push("close".to_string());
        if self.fails(&ScriptedFailure::Close) {
            return Err(PreflightError::PageError {
                message: "scripted close failure".to_string(),
            });
        }
        Ok(())
    }
}
