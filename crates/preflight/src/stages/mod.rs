//! Concrete stages.
//!
//! Each stage owns a fixed, ordered list of checks for one concern. Stages are
//! independent of each other: every per-page check group opens its own page.

pub mod accessibility;
pub mod cross_browser;
pub mod functional;
pub mod integration;
pub mod performance;
pub mod production;
pub mod security;
pub mod visual;

pub use accessibility::AccessibilityStage;
pub use cross_browser::CrossBrowserStage;
pub use functional::FunctionalStage;
pub use integration::IntegrationStage;
pub use performance::PerformanceStage;
pub use production::ProductionStage;
pub use security::SecurityStage;
pub use visual::VisualStage;

use crate::config::{PageSpec, SuiteConfig};
use crate::driver::{BrowserDriver, Viewport};
use crate::result::PreflightResult;

/// Open a fresh page at `viewport` and load `page`, waiting for its ready
/// selector.
pub(crate) async fn open_page(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    page: &PageSpec,
    viewport: &Viewport,
) -> PreflightResult<()> {
    driver.new_page(viewport).await?;
    driver.goto(&config.url(&page.path)).await?;
    driver
        .wait_for_selector(&page.ready_selector, config.timeout())
        .await
}

/// Open a fresh page at the primary viewport and wait for the app shell.
pub(crate) async fn open_app(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<()> {
    driver.new_page(&config.primary_viewport()).await?;
    driver.goto(&config.url("/")).await?;
    driver
        .wait_for_selector(&config.selectors.app_root, config.timeout())
        .await
}
