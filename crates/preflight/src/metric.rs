//! Metric evaluation.
//!
//! Every check a stage performs ends up as a [`CheckResult`]. Numeric checks
//! go through [`evaluate`], which applies the single pass rule used across the
//! whole pipeline: `measured <= threshold`. No metric here is
//! "higher is better".

use crate::accessibility::Impact;
use serde::{Deserialize, Serialize};
use std::fmt;

const MIB: f64 = 1024.0 * 1024.0;

/// Unit of a measured value. Governs display formatting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Milliseconds
    Ms,
    /// Bytes
    Bytes,
    /// Unitless score (e.g. cumulative layout shift)
    Score,
    /// Ratio in `[0, 1]`, displayed as a percentage
    Ratio,
    /// Plain count
    Count,
    /// Pass/fail flag
    Boolean,
}

/// A measured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Measured {
    /// Numeric measurement
    Number(f64),
    /// Boolean outcome
    Flag(bool),
    /// Categorical value (e.g. an audit rule id)
    Text(String),
    /// Nothing could be measured
    Missing,
}

impl Measured {
    /// Numeric value, if any
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// One evaluated assertion. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check identifier (e.g. `home:load-time`, `color-contrast`)
    pub name: String,
    /// Measured value
    pub measured: Measured,
    /// Comparison bound, absent for boolean checks
    pub threshold: Option<f64>,
    /// Unit of `measured` and `threshold`
    pub unit: Unit,
    /// Whether the check passed
    pub passed: bool,
    /// Impact reported by the audit engine (accessibility only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Impact>,
    /// Human-readable detail or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    /// A boolean check
    #[must_use]
    pub fn boolean(name: impl Into<String>, ok: bool) -> Self {
        Self {
            name: name.into(),
            measured: Measured::Flag(ok),
            threshold: None,
            unit: Unit::Boolean,
            passed: ok,
            severity: None,
            message: None,
        }
    }

    /// A check that could not be performed because the driver or
    /// environment failed
    #[must_use]
    pub fn errored(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measured: Measured::Missing,
            threshold: None,
            unit: Unit::Boolean,
            passed: false,
            severity: None,
            message: Some(message.into()),
        }
    }

    /// An audit-engine rule violation. Always failing.
    #[must_use]
    pub fn violation(
        name: impl Into<String>,
        rule_id: impl Into<String>,
        impact: Option<Impact>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            measured: Measured::Text(rule_id.into()),
            threshold: None,
            unit: Unit::Boolean,
            passed: false,
            severity: impact,
            message: Some(message.into()),
        }
    }

    /// Attach a message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether this result came from a failed check attempt rather than a
    /// measurement
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.measured, Measured::Missing) && self.message.is_some() && !self.passed
    }

    /// Display string for the measured value
    #[must_use]
    pub fn display_value(&self) -> String {
        match &self.measured {
            Measured::Number(v) => format_value(*v, self.unit),
            Measured::Flag(b) => b.to_string(),
            Measured::Text(t) => t.clone(),
            Measured::Missing => "n/a".to_string(),
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.display_value())?;
        if let Some(threshold) = self.threshold {
            write!(f, " (threshold {})", format_value(threshold, self.unit))?;
        }
        if let Some(message) = &self.message {
            write!(f, " - {message}")?;
        }
        Ok(())
    }
}

/// Evaluate a measurement against its threshold.
///
/// Passes iff `measured <= threshold` on the raw values. A missing, NaN or
/// infinite measurement fails.
#[must_use]
pub fn evaluate(
    name: impl Into<String>,
    measured: Option<f64>,
    threshold: f64,
    unit: Unit,
) -> CheckResult {
    let (measured, passed) = match measured {
        Some(v) if v.is_finite() => (Measured::Number(v), v <= threshold),
        _ => (Measured::Missing, false),
    };
    CheckResult {
        name: name.into(),
        measured,
        threshold: Some(threshold),
        unit,
        passed,
        severity: None,
        message: None,
    }
}

/// Format a value for humans according to its unit
#[must_use]
pub fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Bytes => format!("{:.2} MB", value / MIB),
        Unit::Ms => format!("{value:.2}ms"),
        Unit::Score => format!("{value:.3}"),
        Unit::Ratio => format!("{:.1}%", value * 100.0),
        Unit::Count => format!("{value:.0}"),
        Unit::Boolean => (value != 0.0).to_string(),
    }
}

/// Statistics for a set of repeated measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    /// Number of samples
    pub count: usize,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Median value
    pub median: f64,
    /// 95th percentile
    pub p95: f64,
    /// Standard deviation
    pub std_dev: f64,
}

impl MetricStats {
    /// Calculate statistics from a slice of values. Non-finite samples are
    /// ignored.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median: Self::percentile(&sorted, 50.0),
            p95: Self::percentile(&sorted, 95.0),
            std_dev: variance.sqrt(),
        }
    }

    /// Median, or `None` when there were no usable samples
    #[must_use]
    pub fn median_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.median)
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        let rank = (p / 100.0) * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        if lower == upper {
            sorted[lower]
        } else {
            let weight = rank - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        }
    }
}
