//! Visual regression stage.
//!
//! Captures every page at every configured viewport, the home page at each
//! responsive breakpoint and under each colour scheme, and compares each
//! capture against its stored baseline.

use super::open_page;
use crate::config::{PageSpec, SuiteConfig};
use crate::driver::{BrowserDriver, ColorScheme, Viewport};
use crate::metric::{CheckResult, Measured, Unit};
use crate::result::{PreflightError, PreflightResult};
use crate::stage::{Stage, StageDetails, StageRecorder};
use crate::visual_regression::{screenshot_key, BaselineComparator, ComparatorConfig, Comparison};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Visual stage payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualDetails {
    /// Every comparison, in capture order
    pub comparisons: Vec<Comparison>,
    /// Keys whose baseline was created by this run
    pub new_baselines: Vec<String>,
}

/// Screenshot comparison across viewports, breakpoints and themes
#[derive(Debug)]
pub struct VisualStage {
    config: Arc<SuiteConfig>,
    comparator: BaselineComparator,
}

impl VisualStage {
    /// Create the stage, storing screenshots under the configured directory
    #[must_use]
    pub fn new(config: Arc<SuiteConfig>) -> Self {
        let comparator = BaselineComparator::new(ComparatorConfig::from_suite(&config));
        Self { config, comparator }
    }

    /// Use a specific comparator
    #[must_use]
    pub fn with_comparator(mut self, comparator: BaselineComparator) -> Self {
        self.comparator = comparator;
        self
    }

    async fn capture(
        &self,
        driver: &mut dyn BrowserDriver,
        shot: &Shot<'_>,
    ) -> PreflightResult<Vec<u8>> {
        let Shot { page, viewport, .. } = *shot;
        match shot.scheme {
            None => open_page(driver, &self.config, page, viewport).await?,
            Some(scheme) => {
                driver.new_page(viewport).await?;
                driver.emulate_color_scheme(scheme).await?;
                driver.goto(&self.config.url(&page.path)).await?;
                driver
                    .wait_for_selector(&page.ready_selector, self.config.timeout())
                    .await?;
            }
        }
        let shot = driver.screenshot().await?;
        if !shot.is_valid() {
            return Err(PreflightError::ScreenshotError {
                message: "empty capture".to_string(),
            });
        }
        Ok(shot.data)
    }

    async fn compare(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
        details: &mut VisualDetails,
        shot: Shot<'_>,
    ) {
        let name = format!("{}:{}", shot.page.name, shot.variant);
        let key = screenshot_key(&shot.page.name, &shot.variant);
        let comparison = match self.capture(driver, &shot).await {
            Ok(png) => self.comparator.compare(&key, &png),
            Err(e) => {
                recorder.record(CheckResult::errored(name, e.to_string()));
                return;
            }
        };

        if comparison.is_new_baseline {
            recorder.warn(format!("new baseline created for {}", comparison.key));
            details.new_baselines.push(comparison.key.clone());
        }
        recorder.record(comparison_check(
            name,
            &comparison,
            self.comparator.config().max_diff_percent,
        ));
        details.comparisons.push(comparison);
    }
}

/// One capture: a page under a named variant
struct Shot<'a> {
    page: &'a PageSpec,
    variant: String,
    viewport: &'a Viewport,
    scheme: Option<ColorScheme>,
}

/// Finding for a comparison: the differing share as a ratio against the
/// configured maximum.
fn comparison_check(name: String, comparison: &Comparison, max_diff_percent: f64) -> CheckResult {
    if let Some(error) = &comparison.error {
        return CheckResult::errored(name, error.clone());
    }
    let check = CheckResult {
        name,
        measured: Measured::Number(comparison.diff_percent / 100.0),
        threshold: Some(max_diff_percent / 100.0),
        unit: Unit::Ratio,
        passed: comparison.passed,
        severity: None,
        message: None,
    };
    match &comparison.diff_path {
        Some(path) if !comparison.passed => {
            check.with_message(format!("diff at {}", path.display()))
        }
        _ => check,
    }
}

#[async_trait]
impl Stage for VisualStage {
    fn name(&self) -> &str {
        "visual"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();
        let mut details = VisualDetails::default();

        for page in &config.pages {
            for viewport in &config.viewports {
                let shot = Shot {
                    page,
                    variant: viewport.name.clone(),
                    viewport,
                    scheme: None,
                };
                self.compare(driver, recorder, &mut details, shot).await;
            }
        }

        if let Some(home) = config.home() {
            for bp in &config.breakpoints {
                let shot = Shot {
                    page: home,
                    variant: format!("bp-{}", bp.name),
                    viewport: bp,
                    scheme: None,
                };
                self.compare(driver, recorder, &mut details, shot).await;
            }
            let viewport = config.primary_viewport();
            for &scheme in &config.themes {
                let shot = Shot {
                    page: home,
                    variant: format!("theme-{scheme}"),
                    viewport: &viewport,
                    scheme: Some(scheme),
                };
                self.compare(driver, recorder, &mut details, shot).await;
            }
        }

        recorder.set_details(StageDetails::Visual(details));
        Ok(())
    }
}
