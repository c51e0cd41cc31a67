//! Test suite aggregator.
//!
//! [`AutomatedTestRunner`] runs the eight per-concern stages unconditionally
//! in order and folds their results into a [`SuiteReport`] with a letter
//! grade. Used as an orchestrator stage it reports under the name `core`.

use crate::accessibility::AuditEngine;
use crate::config::SuiteConfig;
use crate::driver::BrowserDriver;
use crate::observer::ProgressObserver;
use crate::result::PreflightResult;
use crate::stage::{run_stage, Stage, StageCounts, StageDetails, StageRecorder, StageResult};
use crate::stages::{
    AccessibilityStage, CrossBrowserStage, FunctionalStage, IntegrationStage, PerformanceStage,
    ProductionStage, SecurityStage, VisualStage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Letter grade from the suite pass rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Below 70%
    #[serde(rename = "F")]
    F,
    /// 70% and up
    #[serde(rename = "C")]
    C,
    /// 75% and up
    #[serde(rename = "C+")]
    CPlus,
    /// 80% and up
    #[serde(rename = "B")]
    B,
    /// 85% and up
    #[serde(rename = "B+")]
    BPlus,
    /// 90% and up
    #[serde(rename = "A")]
    A,
    /// 95% and up
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    /// Grade for a pass rate in percent
    #[must_use]
    pub fn from_rate(rate: f64) -> Self {
        match rate {
            r if r >= 95.0 => Self::APlus,
            r if r >= 90.0 => Self::A,
            r if r >= 85.0 => Self::BPlus,
            r if r >= 80.0 => Self::B,
            r if r >= 75.0 => Self::CPlus,
            r if r >= 70.0 => Self::C,
            _ => Self::F,
        }
    }

    /// Grade for a tally; nothing evaluated is an F
    #[must_use]
    pub fn from_counts(counts: &StageCounts) -> Self {
        counts.pass_rate().map_or(Self::F, Self::from_rate)
    }

    /// Display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall compliance label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compliance {
    /// Every stage passed
    Compliant,
    /// Some stage failed but the grade is B or better
    Partial,
    /// Grade below B
    NonCompliant,
}

impl Compliance {
    fn from_outcome(all_passed: bool, grade: Grade) -> Self {
        if all_passed {
            Self::Compliant
        } else if grade >= Grade::B {
            Self::Partial
        } else {
            Self::NonCompliant
        }
    }
}

impl fmt::Display for Compliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compliant => "compliant",
            Self::Partial => "partially compliant",
            Self::NonCompliant => "non-compliant",
        })
    }
}

/// Per-stage line of a suite summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLine {
    /// Stage name
    pub stage: String,
    /// Stage verdict
    pub passed: bool,
    /// Stage tallies
    pub counts: StageCounts,
}

/// Aggregated suite outcome carried in a `core` stage result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    /// One line per sub-stage, in run order
    pub stages: Vec<StageLine>,
    /// Summed tallies
    pub totals: StageCounts,
    /// Passing share in percent (0 when nothing ran)
    pub pass_rate: f64,
    /// Letter grade
    pub grade: Grade,
    /// Compliance label
    pub compliance: Compliance,
}

/// Full suite outcome, including every sub-stage result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Sub-stage results in run order
    pub stages: Vec<StageResult>,
    /// Summed tallies
    pub totals: StageCounts,
    /// Passing share in percent (0 when nothing ran)
    pub pass_rate: f64,
    /// Letter grade
    pub grade: Grade,
    /// Compliance label
    pub compliance: Compliance,
}

impl SuiteReport {
    /// Fold stage results into a report
    #[must_use]
    pub fn from_stages(stages: Vec<StageResult>) -> Self {
        let mut totals = StageCounts::default();
        for stage in &stages {
            totals.add(&stage.counts);
            // a crash is a failure the stage itself never counted
            if stage.error.is_some() {
                totals.failed += 1;
            }
        }
        let grade = Grade::from_counts(&totals);
        let all_passed = stages.iter().all(|s| s.passed);
        Self {
            totals,
            pass_rate: totals.pass_rate().unwrap_or(0.0),
            grade,
            compliance: Compliance::from_outcome(all_passed, grade),
            stages,
        }
    }

    /// Whether every sub-stage passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.stages.iter().all(|s| s.passed)
    }

    /// Summary without the per-check findings
    #[must_use]
    pub fn summary(&self) -> SuiteSummary {
        SuiteSummary {
            stages: self
                .stages
                .iter()
                .map(|s| StageLine {
                    stage: s.stage_name.clone(),
                    passed: s.passed,
                    counts: s.counts,
                })
                .collect(),
            totals: self.totals,
            pass_rate: self.pass_rate,
            grade: self.grade,
            compliance: self.compliance,
        }
    }
}

/// Runs the standard stages in sequence
pub struct AutomatedTestRunner {
    stages: Vec<Box<dyn Stage>>,
}

impl fmt::Debug for AutomatedTestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomatedTestRunner")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl AutomatedTestRunner {
    /// Runner over an explicit stage list
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// functional, integration, performance, visual, accessibility,
    /// cross-browser, security, production
    #[must_use]
    pub fn standard(config: Arc<SuiteConfig>, engine: Arc<dyn AuditEngine>) -> Self {
        Self::new(vec![
            Box::new(FunctionalStage::new(config.clone())),
            Box::new(IntegrationStage::new(config.clone())),
            Box::new(PerformanceStage::new(config.clone())),
            Box::new(VisualStage::new(config.clone())),
            Box::new(AccessibilityStage::new(config.clone(), engine)),
            Box::new(CrossBrowserStage::new(config.clone())),
            Box::new(SecurityStage::new(config.clone())),
            Box::new(ProductionStage::new(config)),
        ])
    }

    /// Stage names in run order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage. A failing or crashing stage never skips the next.
    pub async fn run_all(
        &self,
        driver: &mut dyn BrowserDriver,
        observer: Arc<dyn ProgressObserver>,
    ) -> SuiteReport {
        let mut results = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            results.push(run_stage(stage.as_ref(), driver, Arc::clone(&observer)).await);
        }
        SuiteReport::from_stages(results)
    }
}

#[async_trait]
impl Stage for AutomatedTestRunner {
    fn name(&self) -> &str {
        "core"
    }

    async fn run(
        &self,
        driver: &mut dyn BrowserDriver,
        recorder: &mut StageRecorder,
    ) -> PreflightResult<()> {
        let report = self.run_all(driver, recorder.observer()).await;
        for stage in &report.stages {
            recorder.absorb(stage);
        }
        recorder.set_details(StageDetails::Suite(report.summary()));
        Ok(())
    }
}
