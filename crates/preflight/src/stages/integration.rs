//! Component integration: each configured page renders the components it is
//! composed of.

use super::open_page;
use crate::config::{PageSpec, SuiteConfig};
use crate::driver::BrowserDriver;
use crate::metric::CheckResult;
use crate::result::PreflightResult;
use crate::scripts;
use crate::stage::{Stage, StageRecorder};
use async_trait::async_trait;
use std::sync::Arc;

/// Checks page composition
#[derive(Debug, Clone)]
pub struct IntegrationStage {
    config: Arc<SuiteConfig>,
}

impl IntegrationStage {
    /// Create the stage
    #[must_use]
    pub const fn new(config: Arc<SuiteConfig>) -> Self {
        Self { config }
    }
}

async fn page_components(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    page: &PageSpec,
) -> PreflightResult<Vec<CheckResult>> {
    open_page(driver, config, page, &config.primary_viewport()).await?;
    let mut checks = vec![CheckResult::boolean(format!("{}:renders", page.name), true)];
    for component in &page.components {
        let present = driver
            .evaluate(&scripts::element_present(component))
            .await?
            .as_bool()
            .unwrap_or(false);
        let check = CheckResult::boolean(format!("{}:{component}", page.name), present);
        checks.push(if present {
            check
        } else {
            check.with_message("component not rendered")
        });
    }
    Ok(checks)
}

#[async_trait]
impl Stage for IntegrationStage {
    fn name(&self) -> &str {
        "integration"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();
        for page in &config.pages {
            let name = format!("{}:renders", page.name);
            recorder
                .check_many(&name, page_components(driver, config, page))
                .await;
        }
        Ok(())
    }
}
