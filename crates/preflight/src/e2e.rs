//! External end-to-end test tool.
//!
//! The E2E suite is not driven in-process: a configured command (Playwright's
//! JSON reporter by default) runs to completion under a timeout and its
//! `{stats: {failed, duration}}` summary is read back from stdout.

use crate::config::{E2eConfig, SuiteConfig};
use crate::driver::BrowserDriver;
use crate::metric::{evaluate, Unit};
use crate::result::{PreflightError, PreflightResult};
use crate::stage::{Stage, StageDetails, StageRecorder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary reported by the E2E tool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct E2eOutcome {
    /// Failed tests
    pub failed: u64,
    /// Tool-reported duration in milliseconds
    pub duration_ms: f64,
}

/// E2E stage payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct E2eSummary {
    /// Failed tests, when the tool produced a summary
    pub failed: Option<u64>,
    /// Tool-reported duration
    pub duration_ms: Option<f64>,
    /// The run was disabled by configuration
    pub skipped: bool,
}

/// Runs the external E2E suite
#[async_trait]
pub trait E2eRunner: Send + Sync {
    /// Run the suite to completion and return its summary
    async fn run(&self) -> PreflightResult<E2eOutcome>;
}

/// Extract `{stats: {failed, duration}}` from tool output.
///
/// Reporters may print banner lines around the JSON document; everything
/// between the first `{` and the last `}` is parsed.
///
/// # Errors
///
/// Returns error if no JSON object is found or `stats.failed` is missing
pub fn parse_summary(stdout: &str) -> PreflightResult<E2eOutcome> {
    let bad = |message: &str| PreflightError::E2eError {
        message: message.to_string(),
    };
    let start = stdout.find('{').ok_or_else(|| bad("no JSON summary in output"))?;
    let end = stdout.rfind('}').ok_or_else(|| bad("no JSON summary in output"))?;
    if end < start {
        return Err(bad("no JSON summary in output"));
    }
    let doc: Value = serde_json::from_str(&stdout[start..=end])?;
    let stats = doc.get("stats").ok_or_else(|| bad("summary has no stats"))?;
    let failed = stats
        .get("failed")
        .or_else(|| stats.get("unexpected"))
        .and_then(Value::as_u64)
        .ok_or_else(|| bad("summary has no stats.failed"))?;
    let duration_ms = stats.get("duration").and_then(Value::as_f64).unwrap_or(0.0);
    Ok(E2eOutcome {
        failed,
        duration_ms,
    })
}

/// Runs the configured command through `tokio::process`
#[derive(Debug, Clone)]
pub struct CommandE2eRunner {
    config: E2eConfig,
}

impl CommandE2eRunner {
    /// Create a runner for `config.command`
    #[must_use]
    pub const fn new(config: E2eConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl E2eRunner for CommandE2eRunner {
    async fn run(&self) -> PreflightResult<E2eOutcome> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| PreflightError::E2eError {
                message: "no E2E command configured".to_string(),
            })?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        info!(command = %self.config.command.join(" "), "running E2E suite");
        let child = cmd.spawn().map_err(|e| PreflightError::E2eError {
            message: format!("failed to start {program}: {e}"),
        })?;
        let output = tokio::time::timeout(self.config.timeout(), child.wait_with_output())
            .await
            .map_err(|_| PreflightError::Timeout {
                ms: self.config.timeout().as_millis() as u64,
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(status = ?output.status.code(), bytes = stdout.len(), "E2E suite exited");
        // a failing suite exits non-zero but still prints its summary
        parse_summary(&stdout).map_err(|e| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            PreflightError::E2eError {
                message: format!("{e} (exit {:?}; stderr: {tail})", output.status.code()),
            }
        })
    }
}

/// Orchestrator stage wrapping an [`E2eRunner`]
pub struct E2eStage {
    config: Arc<SuiteConfig>,
    runner: Arc<dyn E2eRunner>,
}

impl std::fmt::Debug for E2eStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("E2eStage")
            .field("enabled", &self.config.e2e.enabled)
            .finish_non_exhaustive()
    }
}

impl E2eStage {
    /// Create the stage
    #[must_use]
    pub fn new(config: Arc<SuiteConfig>, runner: Arc<dyn E2eRunner>) -> Self {
        Self { config, runner }
    }
}

#[async_trait]
impl Stage for E2eStage {
    fn name(&self) -> &str {
        "e2e"
    }

    async fn run(
        &self,
        _driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        if !self.config.e2e.enabled {
            recorder.warn("E2E suite disabled");
            recorder.set_details(StageDetails::E2e(E2eSummary {
                skipped: true,
                ..E2eSummary::default()
            }));
            return Ok(());
        }

        let mut summary = E2eSummary::default();
        let outcome = self.runner.run().await.map(|outcome| {
            summary.failed = Some(outcome.failed);
            summary.duration_ms = Some(outcome.duration_ms);
            evaluate("failed-tests", Some(outcome.failed as f64), 0.0, Unit::Count)
        });
        recorder.record_result("failed-tests", outcome);
        recorder.set_details(StageDetails::E2e(summary));
        Ok(())
    }
}
