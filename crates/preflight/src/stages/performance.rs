//! Performance stage.
//!
//! Per page, in order: load time (median of measured iterations after
//! warmup), memory, bundle size, render time, then the Core Web Vitals (FCP,
//! LCP, CLS) observed passively during load. After the per-page pass: heap
//! growth across scripted navigation rounds (leak detection) and the share of
//! slow network requests.

use super::open_page;
use crate::config::{PageSpec, SuiteConfig};
use crate::driver::BrowserDriver;
use crate::metric::{evaluate, CheckResult, MetricStats, Unit};
use crate::result::{PreflightError, PreflightResult};
use crate::scripts;
use crate::stage::{Stage, StageDetails, StageRecorder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Load-time statistics for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLoad {
    /// Page name
    pub page: String,
    /// Measured iterations (warmup excluded)
    pub load_time: MetricStats,
}

/// Performance stage payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDetails {
    /// Per-page load statistics
    pub pages: Vec<PageLoad>,
    /// Heap growth across navigation rounds, in bytes
    pub memory_leak_bytes: Option<f64>,
    /// Slow requests over all requests
    pub slow_request_ratio: Option<f64>,
}

/// Measures load, memory, bundle, render and vitals
#[derive(Debug, Clone)]
pub struct PerformanceStage {
    config: Arc<SuiteConfig>,
}

impl PerformanceStage {
    /// Create the stage
    #[must_use]
    pub const fn new(config: Arc<SuiteConfig>) -> Self {
        Self { config }
    }
}

/// Load the page `warmup + iterations` times on fresh pages, keeping the
/// measured iterations. Leaves the last load open.
async fn measure_load(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    page: &PageSpec,
) -> PreflightResult<MetricStats> {
    let viewport = config.primary_viewport();
    let mut samples = Vec::with_capacity(config.iterations as usize);
    for i in 0..config.warmup + config.iterations {
        open_page(driver, config, page, &viewport).await?;
        let sample = scripts::number(&driver.evaluate(scripts::LOAD_TIME).await?);
        if i >= config.warmup {
            if let Some(ms) = sample {
                samples.push(ms);
            }
        }
    }
    Ok(MetricStats::from_values(&samples))
}

async fn measure(
    driver: &mut dyn BrowserDriver,
    script: &str,
) -> PreflightResult<Option<f64>> {
    Ok(scripts::number(&driver.evaluate(script).await?))
}

async fn bundle_size(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    name: String,
) -> PreflightResult<CheckResult> {
    let summary = driver
        .evaluate(&scripts::resource_summary(config.thresholds.slow_request_ms))
        .await?;
    Ok(evaluate(
        name,
        scripts::field_number(&summary, "scriptBytes"),
        config.thresholds.bundle_bytes,
        Unit::Bytes,
    ))
}

async fn web_vitals(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
    page: &str,
) -> PreflightResult<Vec<CheckResult>> {
    let vitals = driver.evaluate(scripts::WEB_VITALS).await?;
    if !vitals.is_object() {
        return Err(PreflightError::unexpected("web vitals", "expected an object"));
    }
    let t = &config.thresholds;
    Ok(vec![
        evaluate(format!("{page}:fcp"), scripts::field_number(&vitals, "fcp"), t.fcp_ms, Unit::Ms),
        evaluate(format!("{page}:lcp"), scripts::field_number(&vitals, "lcp"), t.lcp_ms, Unit::Ms),
        evaluate(format!("{page}:cls"), scripts::field_number(&vitals, "cls"), t.cls, Unit::Score),
    ])
}

/// Heap delta between a fresh home page and the same page after
/// `leak_cycles` rounds over every configured page.
async fn memory_leak(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<Option<f64>> {
    let home = config
        .home()
        .ok_or_else(|| PreflightError::ConfigError {
            message: "no pages configured".to_string(),
        })?;
    open_page(driver, config, home, &config.primary_viewport()).await?;
    let Some(before) = measure(driver, scripts::HEAP_USED).await? else {
        return Ok(None);
    };

    for _ in 0..config.leak_cycles {
        for page in &config.pages {
            driver.goto(&config.url(&page.path)).await?;
            driver
                .wait_for_selector(&page.ready_selector, config.timeout())
                .await?;
        }
    }
    driver.goto(&config.url(&home.path)).await?;
    driver
        .wait_for_selector(&home.ready_selector, config.timeout())
        .await?;

    Ok(measure(driver, scripts::HEAP_USED)
        .await?
        .map(|after| after - before))
}

async fn slow_request_ratio(
    driver: &mut dyn BrowserDriver,
    config: &SuiteConfig,
) -> PreflightResult<Option<f64>> {
    let summary = driver
        .evaluate(&scripts::resource_summary(config.thresholds.slow_request_ms))
        .await?;
    let requests = scripts::field_number(&summary, "requests");
    let slow = scripts::field_number(&summary, "slow");
    Ok(match (requests, slow) {
        (Some(total), Some(_)) if total <= 0.0 => Some(0.0),
        (Some(total), Some(slow)) => Some(slow / total),
        _ => None,
    })
}

#[async_trait]
impl Stage for PerformanceStage {
    fn name(&self) -> &str {
        "performance"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();
        let t = &config.thresholds;
        let mut details = PerformanceDetails::default();

        for page in &config.pages {
            let p = &page.name;

            let name = format!("{p}:load-time");
            match measure_load(driver, config, page).await {
                Ok(stats) => {
                    let median = stats.median_value();
                    recorder.record(evaluate(&name, median, t.load_time_ms, Unit::Ms));
                    details.pages.push(PageLoad {
                        page: p.clone(),
                        load_time: stats,
                    });
                }
                Err(e) => {
                    // the open page is not this one; further readings would be misattributed
                    recorder.record(CheckResult::errored(name, e.to_string()));
                    continue;
                }
            }

            let name = format!("{p}:memory");
            let outcome = measure(driver, scripts::HEAP_USED)
                .await
                .map(|v| evaluate(&name, v, t.memory_bytes, Unit::Bytes));
            recorder.record_result(&name, outcome);

            let name = format!("{p}:bundle-size");
            recorder
                .check(&name, bundle_size(driver, config, name.clone()))
                .await;

            let name = format!("{p}:render-time");
            let outcome = measure(driver, scripts::RENDER_TIME)
                .await
                .map(|v| evaluate(&name, v, t.render_time_ms, Unit::Ms));
            recorder.record_result(&name, outcome);

            recorder
                .check_many(&format!("{p}:web-vitals"), web_vitals(driver, config, p))
                .await;
        }

        let outcome = memory_leak(driver, config).await.map(|delta| {
            details.memory_leak_bytes = delta;
            evaluate("memory-leak", delta, t.memory_leak_bytes, Unit::Bytes)
        });
        recorder.record_result("memory-leak", outcome);

        let outcome = slow_request_ratio(driver, config).await.map(|ratio| {
            details.slow_request_ratio = ratio;
            evaluate("network-efficiency", ratio, t.slow_request_ratio, Unit::Ratio)
        });
        recorder.record_result("network-efficiency", outcome);

        recorder.set_details(StageDetails::Performance(details));
        Ok(())
    }
}
