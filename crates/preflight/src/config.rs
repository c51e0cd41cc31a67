//! Suite configuration.
//!
//! Everything a run needs to know about the app under test: where it lives,
//! which pages and selectors to drive, metric thresholds, viewports and the
//! collaborating server and E2E commands. Every field has a default so a
//! partial YAML file is enough.

use crate::accessibility::Linearization;
use crate::driver::{ColorScheme, Viewport};
use crate::result::{PreflightError, PreflightResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Top-level configuration for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Base URL of the app under test
    pub base_url: String,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: u64,
    /// Directory for reports and screenshots
    pub output_dir: PathBuf,
    /// Pages exercised by the per-page stages
    pub pages: Vec<PageSpec>,
    /// Metric thresholds
    pub thresholds: Thresholds,
    /// Visual regression settings
    pub visual: VisualConfig,
    /// Device viewports for visual capture
    pub viewports: Vec<Viewport>,
    /// Responsive breakpoints captured on the home page
    pub breakpoints: Vec<Viewport>,
    /// Colour schemes captured on the home page
    pub themes: Vec<ColorScheme>,
    /// Browser profiles for the cross-browser stage
    pub browser_profiles: Vec<BrowserProfile>,
    /// App selectors
    pub selectors: AppSelectors,
    /// Measured load-time iterations per page
    pub iterations: u32,
    /// Discarded load-time iterations per page
    pub warmup: u32,
    /// Navigation rounds across all pages for the memory-leak check
    pub leak_cycles: u32,
    /// Maximum number of text elements sampled for contrast
    pub contrast_sample: usize,
    /// Channel linearisation used by the contrast check
    pub contrast_curve: Linearization,
    /// Tab presses used to probe keyboard focus
    pub keyboard_tabs: u32,
    /// App server
    pub server: ServerConfig,
    /// External E2E tool
    pub e2e: E2eConfig,
    /// Soft wall-clock budget for the whole run, in seconds
    pub max_duration_secs: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            timeout_ms: 30_000,
            output_dir: PathBuf::from("test-results"),
            pages: vec![
                PageSpec::new("home", "/", "[data-testid=\"home-screen\"]")
                    .with_components(&[
                        "[data-testid=\"lesson-card\"]",
                        "[data-testid=\"progress-summary\"]",
                    ]),
                PageSpec::new("lessons", "/lessons", "[data-testid=\"lessons-screen\"]")
                    .with_components(&["[data-testid=\"lesson-card\"]"]),
                PageSpec::new("quiz", "/quiz", "[data-testid=\"quiz-screen\"]")
                    .with_components(&["[data-testid=\"quiz-option\"]"]),
                PageSpec::new("progress", "/progress", "[data-testid=\"progress-screen\"]")
                    .with_components(&["[data-testid=\"progress-chart\"]"]),
                PageSpec::new("profile", "/profile", "[data-testid=\"profile-screen\"]")
                    .with_components(&["[data-testid=\"profile-header\"]"]),
            ],
            thresholds: Thresholds::default(),
            visual: VisualConfig::default(),
            viewports: vec![
                Viewport::new("mobile", 375, 667).mobile(),
                Viewport::new("tablet", 768, 1024).mobile(),
                Viewport::new("desktop", 1920, 1080),
            ],
            breakpoints: vec![
                Viewport::new("xs", 320, 568).mobile(),
                Viewport::new("sm", 576, 800).mobile(),
                Viewport::new("md", 768, 1024),
                Viewport::new("lg", 992, 1024),
                Viewport::new("xl", 1200, 900),
            ],
            themes: vec![ColorScheme::Light, ColorScheme::Dark],
            browser_profiles: BrowserProfile::defaults(),
            selectors: AppSelectors::default(),
            iterations: 3,
            warmup: 1,
            leak_cycles: 3,
            contrast_sample: 50,
            contrast_curve: Linearization::default(),
            keyboard_tabs: 5,
            server: ServerConfig::default(),
            e2e: E2eConfig::default(),
            max_duration_secs: 30 * 60,
        }
    }
}

impl SuiteConfig {
    /// Load from a YAML file; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> PreflightResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parse from YAML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid configuration
    pub fn from_yaml(raw: &str) -> PreflightResult<Self> {
        let config: Self = serde_yaml_ng::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> PreflightResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject configurations no stage can run with.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the offending field
    pub fn validate(&self) -> PreflightResult<()> {
        let invalid = |message: &str| {
            Err(PreflightError::ConfigError {
                message: message.to_string(),
            })
        };
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return invalid("base_url must start with http:// or https://");
        }
        if self.pages.is_empty() {
            return invalid("at least one page is required");
        }
        if self.iterations == 0 {
            return invalid("iterations must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.visual.pixel_threshold) {
            return invalid("visual.pixel_threshold must be within 0..=1");
        }
        if self.server.max_attempts == 0 {
            return invalid("server.max_attempts must be at least 1");
        }
        Ok(())
    }

    /// Absolute URL of a path on the app
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Per-operation timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// URL polled for server readiness
    #[must_use]
    pub fn health_url(&self) -> String {
        self.server
            .health_url
            .clone()
            .unwrap_or_else(|| self.base_url.clone())
    }

    /// First configured page, used by the single-page checks
    #[must_use]
    pub fn home(&self) -> Option<&PageSpec> {
        self.pages.first()
    }

    /// Viewport used when a check is not viewport-specific
    #[must_use]
    pub fn primary_viewport(&self) -> Viewport {
        self.viewports
            .first()
            .cloned()
            .unwrap_or_else(|| Viewport::new("mobile", 375, 667).mobile())
    }

    /// Directory holding screenshots, baselines and diffs
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join(&self.visual.screenshots_dir)
    }
}

/// A page of the app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Short name used in check names and screenshot keys
    pub name: String,
    /// Path relative to the base URL
    pub path: String,
    /// Selector that signals the page has rendered
    pub ready_selector: String,
    /// Component selectors the page must render
    #[serde(default)]
    pub components: Vec<String>,
}

impl PageSpec {
    /// Create a page without component expectations
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        ready_selector: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ready_selector: ready_selector.into(),
            components: Vec::new(),
        }
    }

    /// Set the expected components
    #[must_use]
    pub fn with_components(mut self, components: &[&str]) -> Self {
        self.components = components.iter().map(|c| (*c).to_string()).collect();
        self
    }
}

/// Metric thresholds; every metric is lower-is-better
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Page load time (ms)
    pub load_time_ms: f64,
    /// First contentful paint (ms)
    pub fcp_ms: f64,
    /// Largest contentful paint (ms)
    pub lcp_ms: f64,
    /// Cumulative layout shift (score)
    pub cls: f64,
    /// Used JS heap after load (bytes)
    pub memory_bytes: f64,
    /// Total script transfer size (bytes)
    pub bundle_bytes: f64,
    /// Two-frame render time (ms)
    pub render_time_ms: f64,
    /// Heap growth across navigation rounds (bytes)
    pub memory_leak_bytes: f64,
    /// Share of requests slower than `slow_request_ms`
    pub slow_request_ratio: f64,
    /// What counts as a slow request (ms)
    pub slow_request_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            load_time_ms: 3000.0,
            fcp_ms: 1800.0,
            lcp_ms: 2500.0,
            cls: 0.1,
            memory_bytes: 50.0 * MIB,
            bundle_bytes: 2.0 * MIB,
            render_time_ms: 100.0,
            memory_leak_bytes: 10.0 * MIB,
            slow_request_ratio: 0.1,
            slow_request_ms: 1000.0,
        }
    }
}

/// Visual regression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Maximum differing-pixel percentage that still passes
    pub max_diff_percent: f64,
    /// Per-pixel colour distance tolerance (0..=1)
    pub pixel_threshold: f64,
    /// Count anti-aliased pixels as differences
    pub include_aa: bool,
    /// Screenshot directory, relative to the output directory
    pub screenshots_dir: PathBuf,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            max_diff_percent: 0.2,
            pixel_threshold: 0.1,
            include_aa: false,
            screenshots_dir: PathBuf::from("screenshots"),
        }
    }
}

/// Browser identity for the cross-browser stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProfile {
    /// Profile name
    pub name: String,
    /// User agent string sent by the page
    pub user_agent: String,
    /// Viewport to emulate
    pub viewport: Viewport,
}

impl BrowserProfile {
    fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "chrome-android".to_string(),
                user_agent: "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36".to_string(),
                viewport: Viewport::new("pixel-7", 412, 915).mobile(),
            },
            Self {
                name: "safari-ios".to_string(),
                user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1".to_string(),
                viewport: Viewport::new("iphone-14", 390, 844).mobile(),
            },
            Self {
                name: "firefox-desktop".to_string(),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
                viewport: Viewport::new("desktop", 1366, 768),
            },
        ]
    }
}

/// A bottom tab and the screen it opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSpec {
    /// Tab name
    pub name: String,
    /// Tab button selector
    pub selector: String,
    /// Selector of the screen the tab opens
    pub screen: String,
}

impl TabSpec {
    fn new(name: &str, selector: &str, screen: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            screen: screen.to_string(),
        }
    }
}

/// Selectors the functional stage drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSelectors {
    /// App shell root
    pub app_root: String,
    /// Navigation tabs
    pub tabs: Vec<TabSpec>,
    /// Lesson card in the lesson list
    pub lesson_card: String,
    /// Lesson detail screen
    pub lesson_detail: String,
    /// Button starting the lesson quiz
    pub start_quiz: String,
    /// Quiz answer option
    pub quiz_option: String,
    /// Answer submit button
    pub submit_answer: String,
    /// Feedback shown after submitting
    pub quiz_feedback: String,
    /// `localStorage` key holding user progress
    pub progress_storage_key: String,
    /// Error boundary / red-box overlay
    pub error_overlay: String,
}

impl Default for AppSelectors {
    fn default() -> Self {
        Self {
            app_root: "#root".to_string(),
            tabs: vec![
                TabSpec::new("home", "[data-testid=\"tab-home\"]", "[data-testid=\"home-screen\"]"),
                TabSpec::new(
                    "lessons",
                    "[data-testid=\"tab-lessons\"]",
                    "[data-testid=\"lessons-screen\"]",
                ),
                TabSpec::new(
                    "progress",
                    "[data-testid=\"tab-progress\"]",
                    "[data-testid=\"progress-screen\"]",
                ),
                TabSpec::new(
                    "profile",
                    "[data-testid=\"tab-profile\"]",
                    "[data-testid=\"profile-screen\"]",
                ),
            ],
            lesson_card: "[data-testid=\"lesson-card\"]".to_string(),
            lesson_detail: "[data-testid=\"lesson-detail\"]".to_string(),
            start_quiz: "[data-testid=\"start-quiz\"]".to_string(),
            quiz_option: "[data-testid=\"quiz-option\"]".to_string(),
            submit_answer: "[data-testid=\"submit-answer\"]".to_string(),
            quiz_feedback: "[data-testid=\"quiz-feedback\"]".to_string(),
            progress_storage_key: "userProgress".to_string(),
            error_overlay: "[data-testid=\"error-boundary\"]".to_string(),
        }
    }
}

/// App server readiness and launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Command that starts the dev server (program then arguments)
    pub command: Vec<String>,
    /// Working directory for the command
    pub working_dir: Option<PathBuf>,
    /// Delay between health polls (ms)
    pub poll_interval_ms: u64,
    /// Health polls before giving up
    pub max_attempts: u32,
    /// Health URL, defaults to the base URL
    pub health_url: Option<String>,
    /// Spawn the server when the first poll fails
    pub auto_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "npx".to_string(),
                "expo".to_string(),
                "start".to_string(),
                "--web".to_string(),
            ],
            working_dir: None,
            poll_interval_ms: 1000,
            max_attempts: 30,
            health_url: None,
            auto_start: true,
        }
    }
}

impl ServerConfig {
    /// Delay between polls
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// External end-to-end test tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    /// Run the E2E stage
    pub enabled: bool,
    /// Command printing a `{stats:{failed,duration}}` JSON summary
    pub command: Vec<String>,
    /// Working directory for the command
    pub working_dir: Option<PathBuf>,
    /// Timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: vec![
                "npx".to_string(),
                "playwright".to_string(),
                "test".to_string(),
                "--reporter=json".to_string(),
            ],
            working_dir: None,
            timeout_secs: 300,
        }
    }
}

impl E2eConfig {
    /// Command timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod default_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            let config = SuiteConfig::default();
            assert!(config.validate().is_ok());
            assert_eq!(config.pages.len(), 5);
            assert_eq!(config.thresholds.load_time_ms, 3000.0);
            assert_eq!(config.thresholds.memory_leak_bytes, 10.0 * MIB);
            assert_eq!(config.visual.max_diff_percent, 0.2);
            assert_eq!(config.server.max_attempts, 30);
            assert_eq!(config.e2e.timeout(), Duration::from_secs(300));
            assert_eq!(config.max_duration_secs, 1800);
        }

        #[test]
        fn test_url_joining() {
            let mut config = SuiteConfig::default();
            assert_eq!(config.url("/lessons"), "http://localhost:8081/lessons");
            config.base_url = "http://localhost:8081/".to_string();
            assert_eq!(config.url("quiz"), "http://localhost:8081/quiz");
            assert_eq!(config.url("/"), "http://localhost:8081/");
        }

        #[test]
        fn test_health_url_defaults_to_base() {
            let mut config = SuiteConfig::default();
            assert_eq!(config.health_url(), "http://localhost:8081");
            config.server.health_url = Some("http://localhost:8081/status".to_string());
            assert_eq!(config.health_url(), "http://localhost:8081/status");
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = SuiteConfig::from_yaml(
                "base_url: http://127.0.0.1:19006\nthresholds:\n  load_time_ms: 5000\n",
            )
            .unwrap();
            assert_eq!(config.base_url, "http://127.0.0.1:19006");
            assert_eq!(config.thresholds.load_time_ms, 5000.0);
            assert_eq!(config.thresholds.fcp_ms, 1800.0);
            assert_eq!(config.pages.len(), 5);
        }

        #[test]
        fn test_round_trip_through_yaml() {
            let config = SuiteConfig::default();
            let yaml = config.to_yaml().unwrap();
            assert_eq!(SuiteConfig::from_yaml(&yaml).unwrap(), config);
        }

        #[test]
        fn test_invalid_base_url_rejected() {
            let err = SuiteConfig::from_yaml("base_url: localhost\n").unwrap_err();
            assert!(matches!(err, PreflightError::ConfigError { .. }));
        }

        #[test]
        fn test_empty_pages_rejected() {
            assert!(SuiteConfig::from_yaml("pages: []\n").is_err());
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("preflight.yaml");
            std::fs::write(&path, "iterations: 7\n").unwrap();
            assert_eq!(SuiteConfig::load(&path).unwrap().iterations, 7);
        }
    }
}
