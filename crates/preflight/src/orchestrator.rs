//! Master orchestrator.
//!
//! A linear state machine:
//!
//! ```text
//! Idle -> ServerReady -> CoreTests -> E2eTests -> PerformanceTests
//!      -> AccessibilityTests -> VisualRegressionTests -> ReportGenerated -> Done
//! ```
//!
//! Server readiness is a precondition: failing it aborts the run before any
//! stage or artifact exists. Past it, every stage runs inside
//! [`run_stage`](crate::stage::run_stage) and always yields a result, so the
//! run always reaches `ReportGenerated`.

use crate::accessibility::AuditEngine;
use crate::config::SuiteConfig;
use crate::driver::BrowserDriver;
use crate::e2e::{E2eRunner, E2eStage};
use crate::observer::{NullObserver, ProgressObserver};
use crate::reporter::{Artifacts, MasterReport, ReportWriter};
use crate::result::PreflightResult;
use crate::server::{wait_for_server, HealthProbe, ServerLauncher, ServerStatus};
use crate::stage::{run_stage, Stage, StageResult};
use crate::stages::{AccessibilityStage, PerformanceStage, VisualStage};
use crate::suite::AutomatedTestRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Nothing has happened yet
    Idle,
    /// The app server answered its health check
    ServerReady,
    /// Aggregated functional/integration/... suite
    CoreTests,
    /// External end-to-end tool
    E2eTests,
    /// Performance measurements
    PerformanceTests,
    /// Accessibility audit
    AccessibilityTests,
    /// Screenshot comparison
    VisualRegressionTests,
    /// Artifacts written
    ReportGenerated,
    /// Run finished
    Done,
}

impl Phase {
    /// Display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ServerReady => "server-ready",
            Self::CoreTests => "core-tests",
            Self::E2eTests => "e2e-tests",
            Self::PerformanceTests => "performance-tests",
            Self::AccessibilityTests => "accessibility-tests",
            Self::VisualRegressionTests => "visual-regression-tests",
            Self::ReportGenerated => "report-generated",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Aggregated report
    pub report: MasterReport,
    /// Files written, when a writer was configured
    pub artifacts: Option<Artifacts>,
    /// How the server became ready, when it was checked
    pub server: Option<ServerStatus>,
}

impl RunOutcome {
    /// Process exit code: 0 when production ready
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.report.production_ready {
            0
        } else {
            1
        }
    }
}

/// Drives the whole pipeline
pub struct MasterOrchestrator {
    config: Arc<SuiteConfig>,
    stages: Vec<(Phase, Box<dyn Stage>)>,
    probe: Option<Arc<dyn HealthProbe>>,
    launcher: Option<Arc<dyn ServerLauncher>>,
    writer: Option<ReportWriter>,
    observer: Arc<dyn ProgressObserver>,
}

impl fmt::Debug for MasterOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterOrchestrator")
            .field("phases", &self.phases())
            .field("checks_server", &self.probe.is_some())
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl MasterOrchestrator {
    /// Orchestrator with no stages, no server check and no artifacts
    #[must_use]
    pub fn new(config: Arc<SuiteConfig>) -> Self {
        Self {
            config,
            stages: Vec::new(),
            probe: None,
            launcher: None,
            writer: None,
            observer: Arc::new(NullObserver),
        }
    }

    /// The standard pipeline: core suite, E2E, performance, accessibility,
    /// visual regression
    #[must_use]
    pub fn standard(
        config: Arc<SuiteConfig>,
        engine: Arc<dyn AuditEngine>,
        e2e: Arc<dyn E2eRunner>,
    ) -> Self {
        let core = AutomatedTestRunner::standard(config.clone(), engine.clone());
        Self::new(config.clone())
            .with_stage(Phase::CoreTests, Box::new(core))
            .with_stage(Phase::E2eTests, Box::new(E2eStage::new(config.clone(), e2e)))
            .with_stage(
                Phase::PerformanceTests,
                Box::new(PerformanceStage::new(config.clone())),
            )
            .with_stage(
                Phase::AccessibilityTests,
                Box::new(AccessibilityStage::new(config.clone(), engine)),
            )
            .with_stage(Phase::VisualRegressionTests, Box::new(VisualStage::new(config)))
    }

    /// Append a stage
    #[must_use]
    pub fn with_stage(mut self, phase: Phase, stage: Box<dyn Stage>) -> Self {
        self.stages.push((phase, stage));
        self
    }

    /// Check server readiness before running stages
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Start the server when the first readiness poll fails
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ServerLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Write artifacts after the stages
    #[must_use]
    pub fn with_writer(mut self, writer: ReportWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Report progress to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Phases in run order
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.stages.iter().map(|(phase, _)| *phase).collect()
    }

    /// Wait for the app server, if a probe is configured.
    ///
    /// # Errors
    ///
    /// Returns `ServerUnavailable` when the polling budget runs out
    pub async fn ensure_server(&self) -> PreflightResult<Option<ServerStatus>> {
        let Some(probe) = &self.probe else {
            return Ok(None);
        };
        let status = wait_for_server(
            probe.as_ref(),
            self.launcher.as_deref(),
            &self.config.server,
        )
        .await?;
        Ok(Some(status))
    }

    /// Run every stage in order. Never fails.
    pub async fn run_stages(&self, driver: &mut dyn BrowserDriver) -> Vec<StageResult> {
        let mut results = Vec::with_capacity(self.stages.len());
        for (phase, stage) in &self.stages {
            self.observer.on_phase(*phase);
            results.push(run_stage(stage.as_ref(), driver, Arc::clone(&self.observer)).await);
        }
        results
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns error if the server never becomes ready (no stage runs and no
    /// artifact is written) or if writing artifacts fails
    pub async fn run(&self, driver: &mut dyn BrowserDriver) -> PreflightResult<RunOutcome> {
        let started = Instant::now();
        self.observer.on_phase(Phase::Idle);
        let server = self.ensure_server().await?;
        self.observer.on_phase(Phase::ServerReady);

        let results = self.run_stages(driver).await;
        if let Err(e) = driver.close().await {
            warn!(error = %e, "closing browser failed");
        }

        let elapsed = started.elapsed();
        let budget = Duration::from_secs(self.config.max_duration_secs);
        if elapsed > budget {
            warn!(
                elapsed_secs = elapsed.as_secs(),
                budget_secs = budget.as_secs(),
                "run exceeded its time budget"
            );
        }

        let report = MasterReport::from_stages(self.config.base_url.clone(), results, elapsed);
        let artifacts = match &self.writer {
            Some(writer) => Some(writer.write(&report)?),
            None => None,
        };
        self.observer.on_phase(Phase::ReportGenerated);
        self.observer.on_report(&report);
        info!(
            production_ready = report.production_ready,
            duration_ms = report.overall.duration_ms,
            "run complete"
        );
        self.observer.on_phase(Phase::Done);

        Ok(RunOutcome {
            report,
            artifacts,
            server,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::AxeAuditEngine;
    use crate::driver::ScriptedDriver;
    use crate::e2e::CommandE2eRunner;
    use crate::observer::RecordingObserver;
    use crate::result::PreflightError;
    use crate::server::tests::{fast_config, CountingLauncher, CountingProbe};
    use crate::stage::tests::{Crashing, FiveChecks};
    use tempfile::TempDir;

    fn five_stage(third_panics: bool, dir: &TempDir) -> MasterOrchestrator {
        let mut config = SuiteConfig::default();
        config.output_dir = dir.path().to_path_buf();
        let config = Arc::new(config);
        let third: Box<dyn Stage> = if third_panics {
            Box::new(Crashing { panic: true })
        } else {
            Box::new(FiveChecks { broken: 0 })
        };
        MasterOrchestrator::new(config.clone())
            .with_stage(Phase::CoreTests, Box::new(FiveChecks { broken: 0 }))
            .with_stage(Phase::E2eTests, Box::new(FiveChecks { broken: 0 }))
            .with_stage(Phase::PerformanceTests, third)
            .with_stage(Phase::AccessibilityTests, Box::new(FiveChecks { broken: 0 }))
            .with_stage(Phase::VisualRegressionTests, Box::new(FiveChecks { broken: 0 }))
            .with_writer(ReportWriter::new(&config.output_dir))
    }

    mod completeness_tests {
        use super::*;

        #[tokio::test]
        async fn test_crashing_stage_still_reported() {
            let dir = TempDir::new().unwrap();
            let mut driver = ScriptedDriver::new();
            let outcome = five_stage(true, &dir).run(&mut driver).await.unwrap();

            let report = &outcome.report;
            assert_eq!(report.stages.len(), 5);
            assert!(report.stages[2].error.as_deref().unwrap().contains("page crashed"));
            assert!(!report.production_ready);
            assert_eq!(outcome.exit_code(), 1);

            let artifacts = outcome.artifacts.unwrap();
            assert!(artifacts.master.exists());
            assert!(artifacts.dashboard.exists());
            assert_eq!(artifacts.stages.len(), 5);
            assert!(driver.was_called("close"));
        }

        #[tokio::test]
        async fn test_all_passing_is_production_ready() {
            let dir = TempDir::new().unwrap();
            let outcome = five_stage(false, &dir)
                .run(&mut ScriptedDriver::new())
                .await
                .unwrap();
            assert!(outcome.report.production_ready);
            assert_eq!(outcome.exit_code(), 0);
            assert_eq!(outcome.report.overall.passed, 25);
        }

        #[tokio::test]
        async fn test_phase_sequence() {
            let dir = TempDir::new().unwrap();
            let observer = Arc::new(RecordingObserver::new());
            five_stage(false, &dir)
                .with_observer(observer.clone())
                .run(&mut ScriptedDriver::new())
                .await
                .unwrap();

            let phases: Vec<_> = observer
                .events()
                .into_iter()
                .filter(|e| e.starts_with("phase:"))
                .collect();
            assert_eq!(
                phases,
                [
                    "phase:idle",
                    "phase:server-ready",
                    "phase:core-tests",
                    "phase:e2e-tests",
                    "phase:performance-tests",
                    "phase:accessibility-tests",
                    "phase:visual-regression-tests",
                    "phase:report-generated",
                    "phase:done"
                ]
            );
            assert!(observer.events().contains(&"report:true".to_string()));
        }
    }

    mod server_tests {
        use super::*;

        #[tokio::test]
        async fn test_unreachable_server_is_fatal_without_artifacts() {
            let dir = TempDir::new().unwrap();
            let mut config = SuiteConfig::default();
            config.output_dir = dir.path().join("out");
            config.server = fast_config();
            let config = Arc::new(config);
            let launcher = Arc::new(CountingLauncher::default());
            let orchestrator = MasterOrchestrator::new(config.clone())
                .with_stage(Phase::CoreTests, Box::new(FiveChecks { broken: 0 }))
                .with_probe(Arc::new(CountingProbe::new(0)))
                .with_launcher(launcher.clone())
                .with_writer(ReportWriter::new(&config.output_dir));

            let mut driver = ScriptedDriver::new();
            let err = orchestrator.run(&mut driver).await.unwrap_err();
            assert!(matches!(err, PreflightError::ServerUnavailable { .. }));
            assert!(!config.output_dir.exists());
            assert!(driver.history().is_empty());
            assert_eq!(launcher.launches.load(std::sync::atomic::Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_server_status_recorded() {
            let mut config = SuiteConfig::default();
            config.server = fast_config();
            let orchestrator = MasterOrchestrator::new(Arc::new(config))
                .with_probe(Arc::new(CountingProbe::new(2)))
                .with_launcher(Arc::new(CountingLauncher::default()));
            let outcome = orchestrator.run(&mut ScriptedDriver::new()).await.unwrap();
            let status = outcome.server.unwrap();
            assert_eq!(status.attempts, 2);
            assert!(status.launched);
            // no stages: vacuously ready
            assert!(outcome.report.production_ready);
        }
    }

    #[test]
    fn test_standard_phases() {
        let config = Arc::new(SuiteConfig::default());
        let orchestrator = MasterOrchestrator::standard(
            config.clone(),
            Arc::new(AxeAuditEngine::default()),
            Arc::new(CommandE2eRunner::new(config.e2e.clone())),
        );
        assert_eq!(
            orchestrator.phases(),
            [
                Phase::CoreTests,
                Phase::E2eTests,
                Phase::PerformanceTests,
                Phase::AccessibilityTests,
                Phase::VisualRegressionTests
            ]
        );
    }
}
