//! Master report and artifact writers.
//!
//! The master report folds every stage result into one production-readiness
//! verdict. [`ReportWriter`] persists it as:
//!
//! ```text
//! <output_dir>/
//! ├── <stage>-report-<ts>.json    one per stage, in run order
//! ├── master-report-<ts>.json
//! └── dashboard-<ts>.html         self-contained, inline CSS
//! ```

use crate::metric::format_value;
use crate::result::PreflightResult;
use crate::stage::{StageCounts, StageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Sums over all stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overall {
    /// Passing checks
    pub passed: usize,
    /// Failing checks, plus one per crashed stage
    pub failed: usize,
    /// Warnings
    pub warnings: usize,
    /// Wall-clock duration of the whole run
    pub duration_ms: u64,
}

/// Aggregated result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    /// Application under test
    pub base_url: String,
    /// Stage results in execution order
    pub stages: Vec<StageResult>,
    /// Sums
    pub overall: Overall,
    /// Every stage passed
    pub production_ready: bool,
    /// Follow-up actions
    pub recommendations: Vec<String>,
}

impl MasterReport {
    /// Build the report from finished stages
    #[must_use]
    pub fn from_stages(
        base_url: impl Into<String>,
        stages: Vec<StageResult>,
        elapsed: Duration,
    ) -> Self {
        let mut totals = StageCounts::default();
        for stage in &stages {
            totals.add(&stage.counts);
            if stage.error.is_some() {
                totals.failed += 1;
            }
        }
        let production_ready = stages.iter().all(|s| s.passed);
        let recommendations = recommendations(&stages);
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            base_url: base_url.into(),
            overall: Overall {
                passed: totals.passed,
                failed: totals.failed,
                warnings: totals.warnings,
                duration_ms: elapsed.as_millis() as u64,
            },
            production_ready,
            recommendations,
            stages,
        }
    }

    /// Look up a stage by name
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage_name == name)
    }

    /// Names of stages that did not pass
    #[must_use]
    pub fn failing_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| !s.passed)
            .map(|s| s.stage_name.as_str())
            .collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed, {} warnings in {:.1}s",
            if self.production_ready {
                "PRODUCTION READY"
            } else {
                "NOT PRODUCTION READY"
            },
            self.overall.passed,
            self.overall.failed,
            self.overall.warnings,
            self.overall.duration_ms as f64 / 1000.0
        )
    }

    /// Render the HTML dashboard
    #[must_use]
    pub fn render_html(&self) -> String {
        let mut html = String::new();
        html.push_str(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Preflight Dashboard</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; color: #222; }
        .banner { padding: 20px; border-radius: 8px; margin-bottom: 20px; color: #fff; }
        .banner.ready { background: #2e7d32; }
        .banner.blocked { background: #c62828; }
        .stats { display: flex; gap: 20px; margin-bottom: 20px; }
        .stat { background: #f5f5f5; padding: 12px 20px; border-radius: 8px; }
        .stage { margin: 10px 0; border-radius: 4px; padding: 10px; }
        .stage.pass { background: #e8f5e9; border-left: 4px solid #4caf50; }
        .stage.fail { background: #ffebee; border-left: 4px solid #f44336; }
        table { border-collapse: collapse; width: 100%; margin-top: 8px; }
        td, th { text-align: left; padding: 4px 8px; border-bottom: 1px solid #ddd; font-size: 14px; }
        tr.fail td { color: #c62828; }
        .error { color: #d32f2f; font-family: monospace; white-space: pre-wrap; }
        .warning { color: #e65100; }
    </style>
</head>
<body>
"#,
        );

        let (class, verdict) = if self.production_ready {
            ("ready", "Production ready")
        } else {
            ("blocked", "Not production ready")
        };
        html.push_str(&format!(
            r#"<div class="banner {class}">
    <h1>{verdict}</h1>
    <p>{} &middot; run {} &middot; {}</p>
</div>
<div class="stats">
    <div class="stat"><strong>{}</strong> passed</div>
    <div class="stat"><strong>{}</strong> failed</div>
    <div class="stat"><strong>{}</strong> warnings</div>
    <div class="stat"><strong>{:.1}s</strong></div>
</div>
"#,
            escape_html(&self.base_url),
            self.run_id,
            self.timestamp.to_rfc3339(),
            self.overall.passed,
            self.overall.failed,
            self.overall.warnings,
            self.overall.duration_ms as f64 / 1000.0
        ));

        html.push_str("<h2>Recommendations</h2>\n<ul>\n");
        for rec in &self.recommendations {
            html.push_str(&format!("    <li>{}</li>\n", escape_html(rec)));
        }
        html.push_str("</ul>\n<h2>Stages</h2>\n");

        for stage in &self.stages {
            render_stage(&mut html, stage);
        }

        html.push_str(
            r#"
<footer>
    <p>Generated by preflight</p>
</footer>
</body>
</html>
"#,
        );
        html
    }
}

fn render_stage(html: &mut String, stage: &StageResult) {
    let class = if stage.passed { "pass" } else { "fail" };
    html.push_str(&format!(
        r#"<div class="stage {class}">
    <strong>{}</strong> &ndash; {} passed, {} failed, {} warnings ({} ms)
"#,
        escape_html(&stage.stage_name),
        stage.counts.passed,
        stage.counts.failed,
        stage.counts.warnings,
        stage.duration_ms
    ));
    if let Some(error) = &stage.error {
        html.push_str(&format!(
            "    <div class=\"error\">{}</div>\n",
            escape_html(error)
        ));
    }
    for warning in &stage.warnings {
        html.push_str(&format!(
            "    <div class=\"warning\">{}</div>\n",
            escape_html(warning)
        ));
    }
    if !stage.findings.is_empty() {
        html.push_str("    <table>\n        <tr><th>Check</th><th>Measured</th><th>Threshold</th><th></th></tr>\n");
        for finding in &stage.findings {
            let threshold = finding
                .threshold
                .map(|t| format_value(t, finding.unit))
                .unwrap_or_default();
            html.push_str(&format!(
                "        <tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                if finding.passed { "pass" } else { "fail" },
                escape_html(&finding.name),
                escape_html(&finding.display_value()),
                threshold,
                escape_html(finding.message.as_deref().unwrap_or(""))
            ));
        }
        html.push_str("    </table>\n");
    }
    html.push_str("</div>\n");
}

/// Advice for a failing stage
fn advice(stage: &str) -> &'static str {
    match stage {
        "core" => "Fix failing core suite checks before release",
        "functional" => "Repair broken navigation, forms or interactive elements",
        "integration" => "Check API connectivity, storage persistence and offline behaviour",
        "performance" => "Reduce load times and bundle size; investigate memory growth",
        "accessibility" => "Resolve WCAG violations: landmarks, headings, contrast and keyboard focus",
        "visual" => "Review screenshot diffs and refresh baselines if the change is intended",
        "cross-browser" => "Verify the app shell and required web APIs on every target browser",
        "security" => "Serve over HTTPS, add a CSP and keep secrets out of browser storage",
        "production" => "Complete document metadata and remove broken images and error overlays",
        "e2e" => "Fix failing end-to-end scenarios",
        _ => "Investigate the failing checks",
    }
}

/// Recommendations for `stages`: one per failing stage, or a single
/// all-clear message
#[must_use]
pub fn recommendations(stages: &[StageResult]) -> Vec<String> {
    let failing: Vec<String> = stages
        .iter()
        .filter(|s| !s.passed)
        .map(|s| match &s.error {
            Some(error) => format!(
                "{}: stage crashed ({error}); {}",
                s.stage_name,
                advice(&s.stage_name)
            ),
            None => format!("{}: {}", s.stage_name, advice(&s.stage_name)),
        })
        .collect();
    if failing.is_empty() {
        vec!["All checks passed. The app is ready for production.".to_string()]
    } else {
        failing
    }
}

/// Escape HTML special characters
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Paths written by [`ReportWriter::write`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Master JSON report
    pub master: PathBuf,
    /// HTML dashboard
    pub dashboard: PathBuf,
    /// Per-stage JSON reports, in run order
    pub stages: Vec<PathBuf>,
}

/// Writes report artifacts to an output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// Writer rooted at `output_dir` (created on first write)
    #[must_use]
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Output directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every artifact for `report`.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or a file cannot be
    /// written
    pub fn write(&self, report: &MasterReport) -> PreflightResult<Artifacts> {
        std::fs::create_dir_all(&self.output_dir)?;
        let ts = report.timestamp.format("%Y%m%d-%H%M%S");

        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut stages = Vec::with_capacity(report.stages.len());
        for stage in &report.stages {
            let n = seen.entry(stage.stage_name.as_str()).or_insert(0);
            *n += 1;
            let name = sanitize(&stage.stage_name);
            let file = if *n == 1 {
                format!("{name}-report-{ts}.json")
            } else {
                format!("{name}-{n}-report-{ts}.json")
            };
            let path = self.output_dir.join(file);
            std::fs::write(&path, serde_json::to_string_pretty(stage)?)?;
            stages.push(path);
        }

        let master = self.output_dir.join(format!("master-report-{ts}.json"));
        std::fs::write(&master, serde_json::to_string_pretty(report)?)?;

        let dashboard = self.output_dir.join(format!("dashboard-{ts}.html"));
        std::fs::write(&dashboard, report.render_html())?;

        info!(
            master = %master.display(),
            dashboard = %dashboard.display(),
            stage_reports = stages.len(),
            "report artifacts written"
        );
        Ok(Artifacts {
            master,
            dashboard,
            stages,
        })
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c.to_ascii_lowercase() } else { '-' })
        .collect()
}
