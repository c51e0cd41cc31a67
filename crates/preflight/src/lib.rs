//! Preflight: production-readiness orchestrator for mobile web apps
//!
//! Drives a headless browser against a running app, evaluates functional,
//! integration, performance, accessibility, visual, cross-browser, security
//! and production checks, and folds every result into one verdict.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PREFLIGHT Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Server     │    │ Master     │    │ Browser    │            │
//! │   │ Readiness  │───►│ Orchestr.  │───►│ Driver     │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │                                     │
//! │          ┌────────────────┼─────────────────┐                   │
//! │          ▼                ▼                 ▼                   │
//! │   ┌────────────┐   ┌────────────┐    ┌────────────┐             │
//! │   │ Stages     │   │ E2E Runner │    │ Reporter   │             │
//! │   │ (checks)   │   │ (process)  │    │ JSON/HTML  │             │
//! │   └────────────┘   └────────────┘    └────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stage is isolated: an error or panic inside one becomes a failed
//! [`StageResult`] and the run continues. Only an unreachable server aborts a
//! run.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

#[allow(
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::doc_markdown
)]
pub mod accessibility;
pub mod browser;
pub mod config;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod driver;
pub mod e2e;
pub mod metric;
pub mod observer;
pub mod orchestrator;
pub mod reporter;
pub mod result;
pub mod scripts;
pub mod server;
pub mod stage;
pub mod stages;
pub mod suite;
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub mod visual_regression;

pub use accessibility::{
    AuditEngine, AuditReport, AuditRules, AxeAuditEngine, Color, ContrastAnalysis,
    Impact, Linearization, Violation,
};
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use browser::BrowserConfig;
pub use config::{
    AppSelectors, BrowserProfile, E2eConfig, PageSpec, ServerConfig, SuiteConfig, TabSpec,
    Thresholds, VisualConfig,
};
pub use driver::{
    BrowserDriver, ColorScheme, Screenshot, ScriptedDriver, ScriptedFailure, Viewport,
};
pub use e2e::{CommandE2eRunner, E2eOutcome, E2eRunner, E2eStage, E2eSummary};
pub use metric::{evaluate, format_value, CheckResult, Measured, MetricStats, Unit};
pub use observer::{
    FanoutObserver, NullObserver, ProgressObserver, RecordingObserver, TracingObserver,
};
pub use orchestrator::{MasterOrchestrator, Phase, RunOutcome};
pub use reporter::{Artifacts, MasterReport, Overall, ReportWriter};
pub use result::{PreflightError, PreflightResult};
pub use server::{
    wait_for_server, CommandLauncher, HealthProbe, HttpHealthProbe, ServerLauncher, ServerStatus,
};
pub use stage::{run_stage, Stage, StageCounts, StageDetails, StageRecorder, StageResult};
pub use suite::{AutomatedTestRunner, Compliance, Grade, SuiteReport, SuiteSummary};
pub use visual_regression::{BaselineComparator, ComparatorConfig, Comparison, PixelDiff};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        evaluate, run_stage, AuditEngine, AxeAuditEngine, BrowserDriver, CheckResult,
        CommandE2eRunner, MasterOrchestrator, MasterReport, PreflightError, PreflightResult,
        ProgressObserver, ReportWriter, ScriptedDriver, Stage, StageRecorder, StageResult,
        SuiteConfig, Unit,
    };
}
