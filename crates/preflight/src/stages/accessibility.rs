//! Accessibility stage.
//!
//! For every page: an audit-engine pass (one failing finding per violated
//! rule), a `main` landmark, a level-one heading, sampled text contrast, and
//! keyboard reachability via repeated Tab presses.

use super::open_page;
use crate::accessibility::{AuditEngine, AuditRules, ContrastAnalysis, Violation};
use crate::config::{PageSpec, SuiteConfig};
use crate::driver::BrowserDriver;
use crate::metric::{CheckResult, Measured, Unit};
use crate::result::PreflightResult;
use crate::scripts;
use crate::stage::{Stage, StageDetails, StageRecorder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the stage learned about one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageAccessibility {
    /// Page name
    pub page: String,
    /// Rules the audit engine flagged
    pub violations: Vec<Violation>,
    /// Rules that passed
    pub audit_passes: usize,
    /// Rules needing manual review
    pub incomplete: usize,
    /// `main` landmarks found
    pub main_landmarks: Option<usize>,
    /// Level-one headings found
    pub h1_count: Option<usize>,
    /// Sampled contrast
    pub contrast: Option<ContrastAnalysis>,
    /// Whether any Tab press moved focus off the body
    pub focus_reached: Option<bool>,
}

/// Accessibility stage payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityDetails {
    /// One entry per page, in config order
    pub pages: Vec<PageAccessibility>,
}

impl AccessibilityDetails {
    /// Violations across all pages
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.pages.iter().map(|p| p.violations.len()).sum()
    }
}

/// Audits, landmarks, headings, contrast and keyboard access
pub struct AccessibilityStage {
    config: Arc<SuiteConfig>,
    engine: Arc<dyn AuditEngine>,
    rules: AuditRules,
}

impl std::fmt::Debug for AccessibilityStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessibilityStage")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl AccessibilityStage {
    /// Create the stage with the default WCAG 2.1 AA rule set
    #[must_use]
    pub fn new(config: Arc<SuiteConfig>, engine: Arc<dyn AuditEngine>) -> Self {
        Self {
            config,
            engine,
            rules: AuditRules::default(),
        }
    }

    /// Use a different rule set
    #[must_use]
    pub fn with_rules(mut self, rules: AuditRules) -> Self {
        self.rules = rules;
        self
    }

    async fn audit(
        &self,
        driver: &mut dyn BrowserDriver,
        page: &PageSpec,
        summary: &mut PageAccessibility,
    ) -> PreflightResult<Vec<CheckResult>> {
        open_page(driver, &self.config, page, &self.config.primary_viewport()).await?;
        let report = self.engine.run_audit(driver, &self.rules).await?;
        summary.audit_passes = report.passes;
        summary.incomplete = report.incomplete;

        let checks = if report.is_clean() {
            vec![CheckResult::boolean(format!("{}:audit", page.name), true)]
        } else {
            report
                .violations
                .iter()
                .map(|v| {
                    CheckResult::violation(
                        format!("{}:{}", page.name, v.id),
                        &v.id,
                        v.impact,
                        format!("{} ({} nodes)", v.help, v.nodes),
                    )
                })
                .collect()
        };
        summary.violations = report.violations;
        Ok(checks)
    }
}

async fn count(driver: &mut dyn BrowserDriver, script: &str) -> PreflightResult<Option<usize>> {
    Ok(scripts::number(&driver.evaluate(script).await?).map(|n| n.max(0.0) as usize))
}

fn at_least_one(name: String, found: Option<usize>, what: &str) -> CheckResult {
    let check = CheckResult {
        measured: found.map_or(Measured::Missing, |n| Measured::Number(n as f64)),
        unit: Unit::Count,
        ..CheckResult::boolean(name, found.is_some_and(|n| n >= 1))
    };
    if check.passed {
        check
    } else {
        check.with_message(format!("no {what} found"))
    }
}

async fn keyboard_reach(driver: &mut dyn BrowserDriver, presses: u32) -> PreflightResult<bool> {
    for _ in 0..presses {
        driver.keyboard_press("Tab").await?;
        if !driver.evaluate(scripts::FOCUS_STATE).await?.is_null() {
            return Ok(true);
        }
    }
    Ok(false)
}

#[async_trait]
impl Stage for AccessibilityStage {
    fn name(&self) -> &str {
        "accessibility"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let config = self.config.as_ref();
        let mut details = AccessibilityDetails::default();

        for page in &config.pages {
            let p = &page.name;
            let mut summary = PageAccessibility {
                page: p.clone(),
                ..PageAccessibility::default()
            };

            let audited = recorder
                .check_many(&format!("{p}:audit"), self.audit(driver, page, &mut summary))
                .await;
            if !audited && summary.violations.is_empty() {
                // page never loaded or the engine failed; the remaining
                // checks would only repeat that error
                details.pages.push(summary);
                continue;
            }

            let name = format!("{p}:main-landmark");
            let outcome = count(driver, scripts::MAIN_LANDMARKS).await.map(|n| {
                summary.main_landmarks = n;
                at_least_one(name.clone(), n, "main landmark")
            });
            recorder.record_result(&name, outcome);

            let name = format!("{p}:h1");
            let outcome = count(driver, scripts::H1_COUNT).await.map(|n| {
                summary.h1_count = n;
                at_least_one(name.clone(), n, "level-one heading")
            });
            recorder.record_result(&name, outcome);

            let name = format!("{p}:contrast");
            let outcome = async {
                let sample = driver
                    .evaluate(&scripts::contrast_sample(config.contrast_sample))
                    .await?;
                ContrastAnalysis::from_sample(&sample, config.contrast_curve)
            }
            .await
            .map(|analysis| {
                let check = CheckResult::boolean(name.clone(), analysis.passes_wcag_aa());
                let check = match analysis.failing_pairs.first() {
                    Some(worst) => check.with_message(format!(
                        "{} pairs below 4.5:1, minimum {:.2}:1 ({})",
                        analysis.failing_pairs.len(),
                        analysis.min_ratio,
                        worst.context
                    )),
                    None => check,
                };
                summary.contrast = Some(analysis);
                check
            });
            recorder.record_result(&name, outcome);

            let name = format!("{p}:keyboard");
            let outcome = keyboard_reach(driver, config.keyboard_tabs).await.map(|reached| {
                summary.focus_reached = Some(reached);
                let check = CheckResult::boolean(name.clone(), reached);
                if reached {
                    check
                } else {
                    check.with_message(format!(
                        "focus never left the body after {} Tab presses",
                        config.keyboard_tabs
                    ))
                }
            });
            recorder.record_result(&name, outcome);

            details.pages.push(summary);
        }

        recorder.set_details(StageDetails::Accessibility(details));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::{AxeAuditEngine, Impact};
    use crate::driver::{ScriptedDriver, ScriptedFailure};
    use crate::observer::NullObserver;
    use crate::stage::{run_stage, StageResult};
    use crate::stages::fixtures::healthy_driver;
    use serde_json::json;

    fn config() -> Arc<SuiteConfig> {
        let mut config = SuiteConfig::default();
        config.pages.truncate(2);
        Arc::new(config)
    }

    async fn run(config: &Arc<SuiteConfig>, driver: &mut ScriptedDriver) -> StageResult {
        let stage = AccessibilityStage::new(config.clone(), Arc::new(AxeAuditEngine::default()));
        run_stage(&stage, driver, Arc::new(NullObserver)).await
    }

    fn details(result: &StageResult) -> &AccessibilityDetails {
        match &result.details {
            StageDetails::Accessibility(d) => d,
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_clean_pages_pass() {
        let config = config();
        let mut driver = healthy_driver(&config);
        let result = run(&config, &mut driver).await;

        assert!(result.passed, "{:?}", result.failures().collect::<Vec<_>>());
        assert_eq!(result.counts.passed, 10);
        assert!(result.finding("home:audit").is_some());
        assert!(result.finding("lessons:keyboard").unwrap().passed);
        let details = details(&result);
        assert_eq!(details.pages.len(), 2);
        assert_eq!(details.pages[0].audit_passes, 30);
        assert_eq!(details.violation_count(), 0);
    }

    #[tokio::test]
    async fn test_each_violation_is_a_finding() {
        let config = config();
        let rules = AuditRules::default();
        let mut driver = healthy_driver(&config).overriding(
            scripts::run_axe(&rules.tags),
            json!({
                "violations": [
                    {"id": "color-contrast", "impact": "serious", "help": "Sufficient contrast", "nodes": [{}, {}]},
                    {"id": "image-alt", "impact": "critical", "help": "Images need alt text", "nodes": [{}]}
                ],
                "passes": 20
            }),
        );
        let result = run(&config, &mut driver).await;

        assert!(!result.passed);
        let contrast = result.finding("home:color-contrast").unwrap();
        assert_eq!(contrast.severity, Some(Impact::Serious));
        assert!(contrast.message.as_deref().unwrap().contains("2 nodes"));
        assert!(result.finding("lessons:image-alt").is_some());
        // landmark, heading, contrast and keyboard still run
        assert!(result.finding("home:h1").unwrap().passed);
        assert_eq!(details(&result).violation_count(), 4);
    }

    #[tokio::test]
    async fn test_missing_landmark_and_heading() {
        let config = config();
        let mut driver = healthy_driver(&config)
            .overriding(scripts::MAIN_LANDMARKS, json!(0))
            .overriding(scripts::H1_COUNT, json!(null));
        let result = run(&config, &mut driver).await;

        let landmark = result.finding("home:main-landmark").unwrap();
        assert!(!landmark.passed);
        assert_eq!(landmark.measured, Measured::Number(0.0));
        let h1 = result.finding("home:h1").unwrap();
        assert!(!h1.passed);
        assert_eq!(h1.measured, Measured::Missing);
    }

    #[tokio::test]
    async fn test_low_contrast_fails() {
        let config = config();
        let mut driver = healthy_driver(&config).overriding(
            scripts::contrast_sample(config.contrast_sample),
            json!([
                {"color": "rgb(119, 119, 119)", "background": "rgb(255, 255, 255)", "context": "span: hint"},
                {"color": "rgb(0, 0, 0)", "background": "rgb(255, 255, 255)", "context": "h1: Title"}
            ]),
        );
        let result = run(&config, &mut driver).await;

        let contrast = result.finding("home:contrast").unwrap();
        assert!(!contrast.passed);
        assert!(contrast.message.as_deref().unwrap().contains("span: hint"));
        let analysis = details(&result).pages[0].contrast.clone().unwrap();
        assert_eq!(analysis.pairs_analyzed, 2);
        assert_eq!(analysis.failing_pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_keyboard_reach_uses_configured_presses() {
        let config = config();
        let mut driver = healthy_driver(&config).overriding(scripts::FOCUS_STATE, json!(null));
        let result = run(&config, &mut driver).await;

        assert!(!result.finding("home:keyboard").unwrap().passed);
        let presses = config.keyboard_tabs as usize * config.pages.len();
        assert_eq!(driver.call_count("keyboard_press:Tab"), presses);
    }

    #[tokio::test]
    async fn test_unreachable_page_records_one_error() {
        let config = config();
        let unreachable = config.url(&config.pages[0].path);
        let mut driver = healthy_driver(&config).failing(ScriptedFailure::Goto(unreachable));
        let result = run(&config, &mut driver).await;

        assert!(result.error.is_none());
        assert!(result.finding("home:audit").unwrap().is_error());
        assert!(result.finding("home:h1").is_none());
        assert!(result.finding("lessons:h1").unwrap().passed);
        assert_eq!(result.counts.failed, 1);
    }

    #[tokio::test]
    async fn test_injection_failure_is_audit_error() {
        let config = config();
        let axe = AxeAuditEngine::default();
        let mut driver = healthy_driver(&config)
            .failing(ScriptedFailure::Script(scripts::inject_axe(axe.script_url())));
        let result = run(&config, &mut driver).await;
        let audit = result.finding("home:audit").unwrap();
        assert!(audit.is_error());
        assert!(audit.message.as_deref().unwrap().contains("Accessibility audit"));
    }
}
