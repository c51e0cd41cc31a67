//! Command execution

use crate::commands::{BrowserArgs, RunArgs, SuiteArgs};
use crate::config::{browser_config, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{ConsoleObserver, ProgressReporter};
use preflight::{
    AutomatedTestRunner, AxeAuditEngine, BaselineComparator, BrowserDriver, CommandE2eRunner,
    CommandLauncher, ComparatorConfig, HttpHealthProbe, MasterOrchestrator,
    ProgressObserver, ReportWriter, RunOutcome, SuiteConfig, SuiteReport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes pipeline commands for one resolved configuration
#[derive(Debug)]
pub struct PipelineRunner {
    cli: CliConfig,
    suite: SuiteConfig,
}

impl PipelineRunner {
    /// Create a runner
    #[must_use]
    pub const fn new(cli: CliConfig, suite: SuiteConfig) -> Self {
        Self { cli, suite }
    }

    /// Console observer matching the CLI settings
    #[must_use]
    pub fn observer(&self) -> Arc<ConsoleObserver> {
        let reporter = ProgressReporter::new(
            self.cli.color.should_color(),
            self.cli.verbosity.is_quiet(),
        );
        Arc::new(ConsoleObserver::new(reporter, self.cli.verbosity))
    }

    /// Build the full orchestrator for `run`
    ///
    /// # Errors
    ///
    /// Returns error if the health probe cannot be built
    pub fn orchestrator(
        &self,
        args: &RunArgs,
        observer: Arc<dyn ProgressObserver>,
    ) -> CliResult<MasterOrchestrator> {
        let mut suite = self.suite.clone();
        if args.skip_e2e {
            suite.e2e.enabled = false;
        }
        let suite = Arc::new(suite);

        let probe = HttpHealthProbe::new(suite.health_url(), PROBE_TIMEOUT)?;
        let mut orchestrator = MasterOrchestrator::standard(
            Arc::clone(&suite),
            Arc::new(AxeAuditEngine::default()),
            Arc::new(CommandE2eRunner::new(suite.e2e.clone())),
        )
        .with_probe(Arc::new(probe))
        .with_writer(ReportWriter::new(&suite.output_dir))
        .with_observer(observer);
        if !args.no_server_start {
            orchestrator =
                orchestrator.with_launcher(Arc::new(CommandLauncher::new(&suite.server)));
        }
        Ok(orchestrator)
    }

    /// `preflight run`: returns the process exit code
    ///
    /// # Errors
    ///
    /// Returns error on fatal conditions: unreachable server, no browser,
    /// unwritable artifacts
    pub async fn run(&self, args: &RunArgs) -> CliResult<u8> {
        let observer = self.observer();
        let orchestrator = self.orchestrator(args, observer.clone())?;
        info!(
            base_url = %self.suite.base_url,
            phases = orchestrator.phases().len(),
            "starting run"
        );

        let mut driver = launch_browser(&args.browser, &self.suite).await?;
        let outcome = drive(&orchestrator, driver.as_mut()).await?;
        print_artifacts(observer.reporter(), &outcome);
        Ok(outcome.exit_code())
    }

    /// `preflight suite`: core stages only, printed rather than written
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be started or the report cannot
    /// be serialized
    pub async fn suite(&self, args: &SuiteArgs) -> CliResult<u8> {
        let suite = Arc::new(self.suite.clone());
        let runner =
            AutomatedTestRunner::standard(Arc::clone(&suite), Arc::new(AxeAuditEngine::default()));
        let observer = self.observer();

        let mut driver = launch_browser(&args.browser, &suite).await?;
        let report = runner.run_all(driver.as_mut(), observer.clone()).await;
        if let Err(e) = driver.close().await {
            warn!(error = %e, "closing browser failed");
        }
        observer.reporter().finish();

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_suite_summary(&report);
        }
        Ok(u8::from(!report.passed()))
    }
}

/// Run the orchestrator, closing the browser itself when the run is fatal
async fn drive(
    orchestrator: &MasterOrchestrator,
    driver: &mut dyn BrowserDriver,
) -> CliResult<RunOutcome> {
    match orchestrator.run(driver).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            // the orchestrator only closes the browser after stages ran
            if let Err(close) = driver.close().await {
                warn!(error = %close, "closing browser failed");
            }
            Err(e.into())
        }
    }
}

fn print_artifacts(reporter: &ProgressReporter, outcome: &RunOutcome) {
    if let Some(artifacts) = &outcome.artifacts {
        reporter.info(&format!("Report: {}", artifacts.master.display()));
        reporter.info(&format!("Dashboard: {}", artifacts.dashboard.display()));
    }
}

fn print_suite_summary(report: &SuiteReport) {
    println!(
        "Grade {} ({:.1}%) - {}",
        report.grade, report.pass_rate, report.compliance
    );
    for stage in &report.stages {
        println!(
            "  {:<14} {:>4} passed {:>4} failed {:>4} warnings{}",
            stage.stage_name,
            stage.counts.passed,
            stage.counts.failed,
            stage.counts.warnings,
            if stage.error.is_some() { "  (crashed)" } else { "" }
        );
    }
}

/// `preflight baseline refresh`
///
/// # Errors
///
/// Returns error if the PNG cannot be read, decoded or stored
pub fn refresh_baseline(suite: &SuiteConfig, key: &str, png: &Path) -> CliResult<PathBuf> {
    let bytes = std::fs::read(png)?;
    let comparator = BaselineComparator::new(ComparatorConfig::from_suite(suite));
    Ok(comparator.refresh_baseline(key, &bytes)?)
}

#[cfg(feature = "browser")]
async fn launch_browser(
    args: &BrowserArgs,
    suite: &SuiteConfig,
) -> CliResult<Box<dyn BrowserDriver>> {
    let driver = preflight::ChromiumDriver::launch(browser_config(args, suite))
        .await
        .map_err(|e| CliError::browser(e.to_string()))?;
    Ok(Box::new(driver))
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(
    args: &BrowserArgs,
    suite: &SuiteConfig,
) -> CliResult<Box<dyn BrowserDriver>> {
    let _ = browser_config(args, suite);
    Err(CliError::browser(
        "browser support not enabled. Rebuild with --features browser",
    ))
}
