//! Functional checks: the user journeys the app exists for.
//!
//! Order: app shell, every navigation tab, lesson browsing, lesson detail,
//! quiz answer flow, progress persistence across reload.

use super::open_app;
use crate::config::{SuiteConfig, TabSpec};
use crate::driver::BrowserDriver;
use crate::metric::CheckResult;
use crate::result::{PreflightError, PreflightResult};
use crate::scripts;
use crate::stage::{Stage, StageRecorder};
use async_trait::async_trait;
use std::sync::Arc;

/// Drives the core user flows
#[derive(Debug, Clone)]
pub struct FunctionalStage {
    config: Arc<SuiteConfig>,
}

impl FunctionalStage {
    /// Create the stage
    #[must_use]
    pub const fn new(config: Arc<SuiteConfig>) -> Self {
        Self { config }
    }
}

async fn app_shell(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<CheckResult> {
    open_app(driver, config).await?;
    Ok(CheckResult::boolean("app-shell", true))
}

async fn tab(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    tab: &TabSpec,
) -> PreflightResult<CheckResult> {
    driver.click(&tab.selector).await?;
    driver.wait_for_selector(&tab.screen, config.timeout()).await?;
    Ok(CheckResult::boolean(format!("tab:{}", tab.name), true))
}

async fn lesson_browsing(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<CheckResult> {
    let card = &config.selectors.lesson_card;
    driver.goto(&config.url("/lessons")).await?;
    driver.wait_for_selector(card, config.timeout()).await?;
    let count = scripts::number(&driver.evaluate(&scripts::element_count(card)).await?)
        .ok_or_else(|| PreflightError::unexpected("lesson cards", "count is not a number"))?;
    Ok(CheckResult::boolean("lesson-browsing", count >= 1.0)
        .with_message(format!("{count:.0} lessons listed")))
}

async fn lesson_detail(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<CheckResult> {
    let selectors = &config.selectors;
    driver.click(&selectors.lesson_card).await?;
    driver
        .wait_for_selector(&selectors.lesson_detail, config.timeout())
        .await?;
    Ok(CheckResult::boolean("lesson-detail", true))
}

async fn quiz_flow(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<CheckResult> {
    let selectors = &config.selectors;
    driver.click(&selectors.start_quiz).await?;
    driver
        .wait_for_selector(&selectors.quiz_option, config.timeout())
        .await?;
    driver.click(&selectors.quiz_option).await?;
    driver.click(&selectors.submit_answer).await?;
    driver
        .wait_for_selector(&selectors.quiz_feedback, config.timeout())
        .await?;
    Ok(CheckResult::boolean("quiz-flow", true))
}

async fn progress_persistence(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<CheckResult> {
    let read = scripts::storage_item(&config.selectors.progress_storage_key);
    let before = driver.evaluate(&read).await?;
    driver.goto(&config.url("/")).await?;
    driver
        .wait_for_selector(&config.selectors.app_root, config.timeout())
        .await?;
    let after = driver.evaluate(&read).await?;

    let persisted = !before.is_null() && before == after;
    let check = CheckResult::boolean("progress-persistence", persisted);
    Ok(if before.is_null() {
        check.with_message("no progress stored after completing a quiz")
    } else if persisted {
        check
    } else {
        check.with_message("stored progress changed across reload")
    })
}

#[async_trait]
impl Stage for FunctionalStage {
    fn name(&self) -> &str {
        "functional"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();

        recorder.check("app-shell", app_shell(driver, config)).await;
        for spec in &config.selectors.tabs {
            let name = format!("tab:{}", spec.name);
            recorder.check(&name, tab(driver, config, spec)).await;
        }
        recorder
            .check("lesson-browsing", lesson_browsing(driver, config))
            .await;
        recorder
            .check("lesson-detail", lesson_detail(driver, config))
            .await;
        recorder.check("quiz-flow", quiz_flow(driver, config)).await;
        recorder
            .check("progress-persistence", progress_persistence(driver, config))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ScriptedDriver, ScriptedFailure};
    use crate::observer::NullObserver;
    use crate::stage::run_stage;
    use crate::stages::fixtures::healthy_driver;
    use serde_json::json;

    #[tokio::test]
    async fn test_healthy_app_passes_every_flow() {
        let config = Arc::new(SuiteConfig::default());
        let mut driver = healthy_driver(&config);
        let result = run_stage(
            &FunctionalStage::new(config.clone()),
            &mut driver,
            Arc::new(NullObserver),
        )
        .await;

        assert!(result.passed, "{:?}", result.failures().collect::<Vec<_>>());
        // shell + 4 tabs + browsing + detail + quiz + persistence
        assert_eq!(result.counts.passed, 9);
        let names: Vec<_> = result.findings.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "app-shell",
                "tab:home",
                "tab:lessons",
                "tab:progress",
                "tab:profile",
                "lesson-browsing",
                "lesson-detail",
                "quiz-flow",
                "progress-persistence"
            ]
        );
    }

    #[tokio::test]
    async fn test_broken_tab_does_not_stop_later_flows() {
        let config = Arc::new(SuiteConfig::default());
        let broken = config.selectors.tabs[1].selector.clone();
        let mut driver = healthy_driver(&config).failing(ScriptedFailure::Selector(broken));
        let result = run_stage(
            &FunctionalStage::new(config.clone()),
            &mut driver,
            Arc::new(NullObserver),
        )
        .await;

        assert!(!result.passed);
        assert!(result.error.is_none());
        assert_eq!(result.counts.failed, 1);
        assert_eq!(result.counts.passed, 8);
        assert!(result.finding("tab:lessons").unwrap().is_error());
        assert!(result.finding("quiz-flow").unwrap().passed);
    }

    #[tokio::test]
    async fn test_missing_progress_fails_persistence() {
        let config = SuiteConfig::default();
        let mut driver = ScriptedDriver::new()
            .with_selector(&config.selectors.app_root)
            .with_script(
                scripts::storage_item(&config.selectors.progress_storage_key),
                json!(null),
            );
        let result = progress_persistence(&mut driver, &config).await.unwrap();
        assert!(!result.passed);
        assert!(result.message.unwrap().contains("no progress"));
    }

    #[tokio::test]
    async fn test_changed_progress_fails_persistence() {
        let config = SuiteConfig::default();
        let read = scripts::storage_item(&config.selectors.progress_storage_key);
        let mut driver = ScriptedDriver::new()
            .with_selector(&config.selectors.app_root)
            .with_script(read.clone(), json!("{\"xp\":40}"))
            .with_script(read, json!(null));
        let result = progress_persistence(&mut driver, &config).await.unwrap();
        assert!(!result.passed);
        assert!(result.message.unwrap().contains("changed"));
    }
}
