//! Generic stage machinery.
//!
//! A [`Stage`] drives the browser through a fixed, ordered list of checks and
//! writes what it finds into a [`StageRecorder`]. Failures are contained at
//! two levels:
//!
//! - **check level**: [`StageRecorder::check`] turns an `Err` from one check
//!   into a failing finding and lets the stage carry on;
//! - **stage level**: [`run_stage`] turns an `Err` or a panic escaping
//!   [`Stage::run`] into a failed [`StageResult`] that keeps every count
//!   accumulated so far.
//!
//! Nothing below the orchestrator ever propagates a stage failure.

use crate::driver::BrowserDriver;
use crate::e2e::E2eSummary;
use crate::metric::CheckResult;
use crate::observer::ProgressObserver;
use crate::result::PreflightResult;
use crate::stages::accessibility::AccessibilityDetails;
use crate::stages::performance::PerformanceDetails;
use crate::stages::visual::VisualDetails;
use crate::suite::SuiteSummary;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pass/fail/warning tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    /// Passing checks
    pub passed: usize,
    /// Failing checks
    pub failed: usize,
    /// Non-failing concerns
    pub warnings: usize,
}

impl StageCounts {
    /// Checks evaluated
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Passing share in percent, `None` when nothing was evaluated
    #[must_use]
    pub fn pass_rate(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.passed as f64 / total as f64 * 100.0)
    }

    /// Add another tally into this one
    pub fn add(&mut self, other: &Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.warnings += other.warnings;
    }
}

/// Stage-specific payload attached to a [`StageResult`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StageDetails {
    /// No extra data
    #[default]
    None,
    /// Per-page audit, landmark, heading and contrast breakdown
    Accessibility(AccessibilityDetails),
    /// Every screenshot comparison
    Visual(VisualDetails),
    /// Per-page metric statistics and cross-page measurements
    Performance(PerformanceDetails),
    /// Aggregated sub-stage summary with grade
    Suite(SuiteSummary),
    /// Parsed E2E tool summary
    E2e(E2eSummary),
}

/// Outcome of one stage invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name
    pub stage_name: String,
    /// No failing check and no crash
    pub passed: bool,
    /// Tallies
    pub counts: StageCounts,
    /// One finding per evaluated check, in execution order
    pub findings: Vec<CheckResult>,
    /// Warning messages, one per warning counted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Message of the error or panic that ended the stage early
    pub error: Option<String>,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// Stage-specific payload
    #[serde(default)]
    pub details: StageDetails,
}

impl StageResult {
    /// A stage that crashed before recording anything
    #[must_use]
    pub fn crashed(stage_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            passed: false,
            counts: StageCounts::default(),
            findings: Vec::new(),
            warnings: Vec::new(),
            error: Some(error.into()),
            duration_ms: 0,
            details: StageDetails::None,
        }
    }

    /// First finding with this name
    #[must_use]
    pub fn finding(&self, name: &str) -> Option<&CheckResult> {
        self.findings.iter().find(|f| f.name == name)
    }

    /// Failing findings
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.findings.iter().filter(|f| !f.passed)
    }
}

/// One phase of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name as it appears in reports
    fn name(&self) -> &str;

    /// Run every check in order, recording into `recorder`.
    ///
    /// Returning `Err` (or panicking) ends the stage early; whatever was
    /// recorded is kept.
    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()>;
}

/// Accumulates findings, counts and details for one stage run
pub struct StageRecorder {
    stage: String,
    observer: Arc<dyn ProgressObserver>,
    counts: StageCounts,
    findings: Vec<CheckResult>,
    warnings: Vec<String>,
    details: StageDetails,
}

impl std::fmt::Debug for StageRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRecorder")
            .field("stage", &self.stage)
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}

impl StageRecorder {
    /// Create a recorder for `stage`
    #[must_use]
    pub fn new(stage: impl Into<String>, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            stage: stage.into(),
            observer,
            counts: StageCounts::default(),
            findings: Vec::new(),
            warnings: Vec::new(),
            details: StageDetails::None,
        }
    }

    /// Stage name
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Tallies so far
    #[must_use]
    pub const fn counts(&self) -> StageCounts {
        self.counts
    }

    /// Observer this recorder reports to
    #[must_use]
    pub fn observer(&self) -> Arc<dyn ProgressObserver> {
        Arc::clone(&self.observer)
    }

    /// Record a finding; returns whether it passed
    pub fn record(&mut self, check: CheckResult) -> bool {
        self.observer.on_check(&self.stage, &check);
        self.push(check)
    }

    fn push(&mut self, check: CheckResult) -> bool {
        let passed = check.passed;
        if passed {
            self.counts.passed += 1;
        } else {
            self.counts.failed += 1;
        }
        self.findings.push(check);
        passed
    }

    /// Count a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.observer.on_warning(&self.stage, &message);
        self.counts.warnings += 1;
        self.warnings.push(message);
    }

    /// Record the outcome of a check. An `Err` becomes a failing finding
    /// named `name`.
    pub fn record_result(&mut self, name: &str, outcome: PreflightResult<CheckResult>) -> bool {
        match outcome {
            Ok(result) => self.record(result),
            Err(e) => self.record(CheckResult::errored(name, e.to_string())),
        }
    }

    /// Run one check. An `Err` becomes a failing finding named `name`.
    pub async fn check<F>(&mut self, name: &str, check: F) -> bool
    where
        F: Future<Output = PreflightResult<CheckResult>>,
    {
        let outcome = check.await;
        self.record_result(name, outcome)
    }

    /// Run a check that yields several findings. An `Err` becomes one
    /// failing finding named `name`.
    pub async fn check_many<F>(&mut self, name: &str, checks: F) -> bool
    where
        F: Future<Output = PreflightResult<Vec<CheckResult>>>,
    {
        match checks.await {
            Ok(results) => results
                .into_iter()
                .fold(true, |all, result| self.record(result) && all),
            Err(e) => self.record(CheckResult::errored(name, e.to_string())),
        }
    }

    /// Attach the stage-specific payload
    pub fn set_details(&mut self, details: StageDetails) {
        self.details = details;
    }

    /// Fold a finished sub-stage into this one. Finding names and warnings are
    /// prefixed with the sub-stage name; a crashed sub-stage contributes one
    /// extra failing finding carrying its error.
    pub fn absorb(&mut self, sub: &StageResult) {
        let prefix = &sub.stage_name;
        for finding in &sub.findings {
            let mut finding = finding.clone();
            finding.name = format!("{prefix}/{}", finding.name);
            self.push(finding);
        }
        for warning in &sub.warnings {
            self.counts.warnings += 1;
            self.warnings.push(format!("{prefix}: {warning}"));
        }
        if let Some(error) = &sub.error {
            self.push(CheckResult::errored(prefix.clone(), error.clone()));
        }
    }

    /// Close the recorder into a result
    #[must_use]
    pub fn finish(self, error: Option<String>, elapsed: Duration) -> StageResult {
        StageResult {
            passed: self.counts.failed == 0 && error.is_none(),
            stage_name: self.stage,
            counts: self.counts,
            findings: self.findings,
            warnings: self.warnings,
            error,
            duration_ms: elapsed.as_millis() as u64,
            details: self.details,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "stage panicked".to_string(), |m| format!("stage panicked: {m}"))
}

/// Run a stage inside its failure boundary. Never fails.
pub async fn run_stage(
    stage: &dyn Stage,
    driver: &mut dyn BrowserDriver,
    observer: Arc<dyn ProgressObserver>,
) -> StageResult {
    let started = Instant::now();
    observer.on_stage_start(stage.name());

    let mut recorder = StageRecorder::new(stage.name(), Arc::clone(&observer));
    let outcome = AssertUnwindSafe(stage.run(driver, &mut recorder))
        .catch_unwind()
        .await;
    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    let result = recorder.finish(error, started.elapsed());
    observer.on_stage_complete(&result);
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;
    use crate::metric::{evaluate, Unit};
    use crate::observer::{NullObserver, RecordingObserver};
    use crate::result::PreflightError;

    /// Five checks where one (1-based `broken`) errors
    pub(crate) struct FiveChecks {
        pub(crate) broken: usize,
    }

    #[async_trait]
    impl Stage for FiveChecks {
        fn name(&self) -> &str {
            "five"
        }

        async fn run(
            &self,
            _driver: &mut dyn BrowserDriver,
            recorder: &mut StageRecorder,
        ) -> PreflightResult<()> {
            for i in 1..=5 {
                let broken = i == self.broken;
                recorder
                    .check(&format!("check-{i}"), async move {
                        if broken {
                            Err(PreflightError::script("driver lost"))
                        } else {
                            Ok(evaluate(format!("check-{i}"), Some(1.0), 2.0, Unit::Ms))
                        }
                    })
                    .await;
            }
            Ok(())
        }
    }

    /// Records two passing checks and then fails or panics
    pub(crate) struct Crashing {
        pub(crate) panic: bool,
    }

    #[async_trait]
    impl Stage for Crashing {
        fn name(&self) -> &str {
            "crashing"
        }

        async fn run(
            &self,
            _driver: &mut dyn BrowserDriver,
            recorder: &mut StageRecorder,
        ) -> PreflightResult<()> {
            recorder.record(CheckResult::boolean("first", true));
            recorder.record(CheckResult::boolean("second", true));
            recorder.warn("about to crash");
            if self.panic {
                panic!("page crashed");
            }
            Err(PreflightError::PageError {
                message: "target closed".to_string(),
            })
        }
    }

    mod counts_tests {
        use super::*;

        #[test]
        fn test_pass_rate() {
            let counts = StageCounts {
                passed: 9,
                failed: 1,
                warnings: 3,
            };
            assert_eq!(counts.total(), 10);
            assert_eq!(counts.pass_rate(), Some(90.0));
            assert_eq!(StageCounts::default().pass_rate(), None);
        }

        #[test]
        fn test_add() {
            let mut total = StageCounts::default();
            total.add(&StageCounts {
                passed: 1,
                failed: 2,
                warnings: 3,
            });
            total.add(&StageCounts {
                passed: 1,
                failed: 0,
                warnings: 0,
            });
            assert_eq!(
                total,
                StageCounts {
                    passed: 2,
                    failed: 2,
                    warnings: 3
                }
            );
        }
    }

    mod isolation_tests {
        use super::*;

        #[tokio::test]
        async fn test_erroring_check_does_not_abort_siblings() {
            let mut driver = ScriptedDriver::new();
            let result =
                run_stage(&FiveChecks { broken: 2 }, &mut driver, Arc::new(NullObserver)).await;

            assert!(!result.passed);
            assert!(result.error.is_none());
            assert_eq!(result.counts.failed, 1);
            assert_eq!(result.counts.passed, 4);
            assert_eq!(result.counts.total(), result.findings.len());
            let names: Vec<_> = result.findings.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, ["check-1", "check-2", "check-3", "check-4", "check-5"]);
            assert!(result.findings[1].is_error());
        }

        #[tokio::test]
        async fn test_stage_error_keeps_counts() {
            let mut driver = ScriptedDriver::new();
            let result =
                run_stage(&Crashing { panic: false }, &mut driver, Arc::new(NullObserver)).await;
            assert!(!result.passed);
            assert_eq!(result.counts.passed, 2);
            assert_eq!(result.counts.warnings, 1);
            assert!(result.error.unwrap().contains("target closed"));
        }

        #[tokio::test]
        async fn test_stage_panic_is_contained() {
            let mut driver = ScriptedDriver::new();
            let result =
                run_stage(&Crashing { panic: true }, &mut driver, Arc::new(NullObserver)).await;
            assert!(!result.passed);
            assert_eq!(result.counts.passed, 2);
            assert!(result.error.unwrap().contains("page crashed"));
        }

        #[tokio::test]
        async fn test_observer_sees_lifecycle() {
            let observer = Arc::new(RecordingObserver::new());
            let mut driver = ScriptedDriver::new();
            run_stage(&FiveChecks { broken: 0 }, &mut driver, observer.clone()).await;
            let events = observer.events();
            assert_eq!(events.first().map(String::as_str), Some("start:five"));
            assert_eq!(events.last().map(String::as_str), Some("complete:five:pass"));
            assert_eq!(events.len(), 7);
        }
    }

    mod recorder_tests {
        use super::*;

        #[tokio::test]
        async fn test_check_many_records_each() {
            let mut recorder = StageRecorder::new("perf", Arc::new(NullObserver));
            let all = recorder
                .check_many("vitals", async {
                    Ok(vec![
                        CheckResult::boolean("fcp", true),
                        CheckResult::boolean("lcp", false),
                        CheckResult::boolean("cls", true),
                    ])
                })
                .await;
            assert!(!all);
            let result = recorder.finish(None, Duration::ZERO);
            assert_eq!(result.counts.passed, 2);
            assert_eq!(result.counts.failed, 1);
        }

        #[test]
        fn test_absorb_prefixes_and_surfaces_crash() {
            let mut sub = StageResult::crashed("security", "boom");
            sub.findings.push(CheckResult::boolean("https", true));
            sub.counts.passed = 1;
            sub.warnings.push("no CSP".to_string());

            let mut recorder = StageRecorder::new("core", Arc::new(NullObserver));
            recorder.absorb(&sub);
            let result = recorder.finish(None, Duration::ZERO);

            assert_eq!(result.findings[0].name, "security/https");
            assert_eq!(result.findings[1].name, "security");
            assert!(result.findings[1].is_error());
            assert_eq!(result.counts.passed, 1);
            assert_eq!(result.counts.failed, 1);
            assert_eq!(result.counts.warnings, 1);
            assert_eq!(result.warnings, ["security: no CSP"]);
        }

        #[test]
        fn test_stage_result_serializes_tagged_details() {
            let result = StageRecorder::new("x", Arc::new(NullObserver))
                .finish(None, Duration::from_millis(5));
            let json = serde_json::to_value(&result).unwrap();
            assert_eq!(json["details"]["kind"], "none");
            assert_eq!(json["duration_ms"], 5);
            assert!(json.get("warnings").is_none());
        }
    }
}
