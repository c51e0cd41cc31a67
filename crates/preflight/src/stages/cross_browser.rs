//! Cross-browser compatibility: the app shell loads under each browser
//! identity and the APIs it depends on exist.

use crate::config::{BrowserProfile, SuiteConfig};
use crate::driver::BrowserDriver;
use crate::metric::CheckResult;
use crate::result::{PreflightError, PreflightResult};
use crate::scripts;
use crate::stage::{Stage, StageRecorder};
use async_trait::async_trait;
use std::sync::Arc;

const FEATURES: [&str; 3] = ["localStorage", "fetch", "promise"];

/// Loads the app under every configured browser profile
#[derive(Debug, Clone)]
pub struct CrossBrowserStage {
    config: Arc<SuiteConfig>,
}

impl CrossBrowserStage {
    /// Create the stage
    #[must_use]
    pub const fn new(config: Arc<SuiteConfig>) -> Self {
        Self { config }
    }
}

async fn app_shell(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    profile: &BrowserProfile,
) -> PreflightResult<CheckResult> {
    driver.new_page(&profile.viewport).await?;
    driver.set_user_agent(&profile.user_agent).await?;
    driver.goto(&config.url("/")).await?;
    driver
        .wait_for_selector(&config.selectors.app_root, config.timeout())
        .await?;
    Ok(CheckResult::boolean(format!("{}:app-shell", profile.name), true))
}

async fn features(
    driver: &mut dyn BrowserDriver,
    profile: &BrowserProfile,
) -> PreflightResult<Vec<CheckResult>> {
    let support = driver.evaluate(scripts::FEATURE_SUPPORT).await?;
    if !support.is_object() {
        return Err(PreflightError::unexpected("feature support", "expected an object"));
    }
    Ok(FEATURES
        .iter()
        .map(|feature| {
            let ok = scripts::field_flag(&support, feature);
            let check = CheckResult::boolean(format!("{}:{feature}", profile.name), ok);
            if ok {
                check
            } else {
                check.with_message(format!("{feature} unavailable"))
            }
        })
        .collect())
}

#[async_trait]
impl Stage for CrossBrowserStage {
    fn name(&self) -> &str {
        "cross-browser"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();
        for profile in &config.browser_profiles {
            let name = format!("{}:app-shell", profile.name);
            if !recorder.check(&name, app_shell(driver, config, profile)).await {
                continue;
            }
            recorder
                .check_many(&format!("{}:features", profile.name), features(driver, profile))
                .await;
        }
        Ok(())
    }
}
