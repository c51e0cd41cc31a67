//! Progress observation.
//!
//! Stages and the orchestrator never print. They report progress through a
//! [`ProgressObserver`]; the CLI plugs in a console implementation, tests use
//! [`RecordingObserver`] or [`NullObserver`], and [`TracingObserver`] turns
//! events into structured log records.

use crate::metric::CheckResult;
use crate::orchestrator::Phase;
use crate::reporter::MasterReport;
use crate::stage::StageResult;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Receiver for pipeline progress events. Every method defaults to a no-op.
pub trait ProgressObserver: Send + Sync {
    /// The orchestrator entered a phase
    fn on_phase(&self, _phase: Phase) {}

    /// A stage is about to run
    fn on_stage_start(&self, _stage: &str) {}

    /// A check finished
    fn on_check(&self, _stage: &str, _check: &CheckResult) {}

    /// A non-failing concern was raised
    fn on_warning(&self, _stage: &str, _message: &str) {}

    /// A stage finished (successfully or not)
    fn on_stage_complete(&self, _result: &StageResult) {}

    /// The master report was built
    fn on_report(&self, _report: &MasterReport) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Observer emitting `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_phase(&self, phase: Phase) {
        info!(phase = %phase, "entering phase");
    }

    fn on_stage_start(&self, stage: &str) {
        info!(stage, "stage started");
    }

    fn on_check(&self, stage: &str, check: &CheckResult) {
        if check.passed {
            debug!(stage, check = %check, "check passed");
        } else {
            warn!(stage, check = %check, "check failed");
        }
    }

    fn on_warning(&self, stage: &str, message: &str) {
        warn!(stage, message, "stage warning");
    }

    fn on_stage_complete(&self, result: &StageResult) {
        info!(
            stage = %result.stage_name,
            passed = result.passed,
            checks_passed = result.counts.passed,
            checks_failed = result.counts.failed,
            warnings = result.counts.warnings,
            duration_ms = result.duration_ms,
            "stage complete"
        );
        if let Some(error) = &result.error {
            warn!(stage = %result.stage_name, error = %error, "stage crashed");
        }
    }

    fn on_report(&self, report: &MasterReport) {
        info!(
            run_id = %report.run_id,
            production_ready = report.production_ready,
            passed = report.overall.passed,
            failed = report.overall.failed,
            "report generated"
        );
    }
}

/// Forwards every event to several observers in order
#[derive(Default, Clone)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl FanoutObserver {
    /// Create an empty fan-out
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl std::fmt::Debug for FanoutObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ProgressObserver for FanoutObserver {
    fn on_phase(&self, phase: Phase) {
        self.observers.iter().for_each(|o| o.on_phase(phase));
    }

    fn on_stage_start(&self, stage: &str) {
        self.observers.iter().for_each(|o| o.on_stage_start(stage));
    }

    fn on_check(&self, stage: &str, check: &CheckResult) {
        self.observers.iter().for_each(|o| o.on_check(stage, check));
    }

    fn on_warning(&self, stage: &str, message: &str) {
        self.observers.iter().for_each(|o| o.on_warning(stage, message));
    }

    fn on_stage_complete(&self, result: &StageResult) {
        self.observers.iter().for_each(|o| o.on_stage_complete(result));
    }

    fn on_report(&self, report: &MasterReport) {
        self.observers.iter().for_each(|o| o.on_report(report));
    }
}

/// Observer that keeps a textual event log, for tests and debugging
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_phase(&self, phase: Phase) {
        self.push(format!("phase:{phase}"));
    }

    fn on_stage_start(&self, stage: &str) {
        self.push(format!("start:{stage}"));
    }

    fn on_check(&self, stage: &str, check: &CheckResult) {
        let verdict = if check.passed { "pass" } else { "fail" };
        self.push(format!("check:{stage}:{}:{verdict}", check.name));
    }

    fn on_warning(&self, stage: &str, message: &str) {
        self.push(format!("warn:{stage}:{message}"));
    }

    fn on_stage_complete(&self, result: &StageResult) {
        let verdict = if result.passed { "pass" } else { "fail" };
        self.push(format!("complete:{}:{verdict}", result.stage_name));
    }

    fn on_report(&self, report: &MasterReport) {
        self.push(format!("report:{}", report.production_ready));
    }
}
