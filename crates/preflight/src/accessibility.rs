//! Accessibility validation.
//!
//! This module provides the pieces the accessibility stage is built from:
//! - Color contrast analysis (WCAG 2.1 AA, 4.5:1 for normal text)
//! - CSS colour parsing for computed styles
//! - Audit-engine violation records and the [`AuditEngine`] seam
//! - [`AxeAuditEngine`], which injects axe-core into the page under test

use crate::driver::BrowserDriver;
use crate::result::{PreflightError, PreflightResult};
use crate::scripts;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Minimum contrast ratio for normal text (WCAG 2.1 AA)
pub const MIN_CONTRAST_NORMAL: f64 = 4.5;

/// Minimum contrast ratio for large text (WCAG 2.1 AA)
pub const MIN_CONTRAST_LARGE: f64 = 3.0;

/// Default axe-core location
pub const AXE_CDN_URL: &str = "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.8.2/axe.min.js";

/// How 8-bit channel values are linearised before computing luminance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Linearization {
    /// Exact sRGB transfer curve from WCAG 2.1
    Srgb,
    /// Simplified `(c/255)^2.2` curve; slightly stricter around mid-greys
    #[default]
    Gamma22,
}

impl Linearization {
    fn apply(self, channel: u8) -> f64 {
        let value = f64::from(channel) / 255.0;
        match self {
            Self::Srgb => {
                if value <= 0.03928 {
                    value / 12.92
                } else {
                    ((value + 0.055) / 1.055).powf(2.4)
                }
            }
            Self::Gamma22 => value.powf(2.2),
        }
    }
}

/// Color represented as RGB values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
}

impl Color {
    /// White, the assumed page background
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a new color
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create from hex value (e.g., 0xFF5500)
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }

    /// Relative luminance `0.2126R + 0.7152G + 0.0722B` on linearised channels
    #[must_use]
    pub fn relative_luminance(&self, curve: Linearization) -> f64 {
        let r = curve.apply(self.r);
        let g = curve.apply(self.g);
        let b = curve.apply(self.b);
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }

    /// Contrast ratio `(L1 + 0.05) / (L2 + 0.05)` with `L1 >= L2`
    #[must_use]
    pub fn contrast_ratio(&self, other: &Self, curve: Linearization) -> f64 {
        let l1 = self.relative_luminance(curve);
        let l2 = other.relative_luminance(curve);

        let lighter = l1.max(l2);
        let darker = l1.min(l2);

        (lighter + 0.05) / (darker + 0.05)
    }

    /// Check if contrast meets WCAG AA for normal text
    #[must_use]
    pub fn meets_wcag_aa_normal(&self, other: &Self, curve: Linearization) -> bool {
        self.contrast_ratio(other, curve) >= MIN_CONTRAST_NORMAL
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

fn rgb_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([\d.]+)\s*)?\)$",
            )
            .ok()
        })
        .as_ref()
}

/// Parse a computed CSS colour (`rgb(...)`, `rgba(...)`, `#rgb`, `#rrggbb`).
///
/// Fully transparent colours yield `None`, as do unrecognised formats.
#[must_use]
pub fn parse_css_color(raw: &str) -> Option<Color> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        return match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(Color::from_hex),
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16).ok().map(Color::from_hex)
            }
            _ => None,
        };
    }

    let caps = rgb_pattern()?.captures(raw)?;
    if let Some(alpha) = caps.get(4) {
        let alpha: f64 = alpha.as_str().parse().ok()?;
        if alpha <= 0.0 {
            return None;
        }
    }
    let channel = |i: usize| caps.get(i)?.as_str().parse::<u8>().ok();
    Some(Color::new(channel(1)?, channel(2)?, channel(3)?))
}

/// One text/background pair sampled from the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastPair {
    /// Foreground color
    pub foreground: Color,
    /// Background color
    pub background: Color,
    /// Contrast ratio between them
    pub ratio: f64,
    /// Where this pair was found
    pub context: String,
}

/// Results of a contrast analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastAnalysis {
    /// Minimum contrast ratio found
    pub min_ratio: f64,
    /// Number of color pairs analyzed
    pub pairs_analyzed: usize,
    /// Elements whose colours could not be parsed
    pub skipped: usize,
    /// Color pairs that fail WCAG AA
    pub failing_pairs: Vec<ContrastPair>,
}

impl ContrastAnalysis {
    /// Create an empty analysis
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            min_ratio: f64::MAX,
            pairs_analyzed: 0,
            skipped: 0,
            failing_pairs: Vec::new(),
        }
    }

    /// Whether every analysed pair meets 4.5:1
    #[must_use]
    pub fn passes_wcag_aa(&self) -> bool {
        self.failing_pairs.is_empty()
    }

    /// Add a color pair to the analysis
    pub fn add_pair(
        &mut self,
        foreground: Color,
        background: Color,
        context: impl Into<String>,
        curve: Linearization,
    ) {
        let ratio = foreground.contrast_ratio(&background, curve);
        self.pairs_analyzed += 1;
        self.min_ratio = self.min_ratio.min(ratio);

        if ratio < MIN_CONTRAST_NORMAL {
            self.failing_pairs.push(ContrastPair {
                foreground,
                background,
                ratio,
                context: context.into(),
            });
        }
    }

    /// Build from the array returned by [`scripts::contrast_sample`].
    ///
    /// # Errors
    ///
    /// Returns error if the value is not an array
    pub fn from_sample(sample: &Value, curve: Linearization) -> PreflightResult<Self> {
        let items = sample
            .as_array()
            .ok_or_else(|| PreflightError::unexpected("contrast sample", "expected an array"))?;

        let mut analysis = Self::empty();
        for item in items {
            let color = item.get("color").and_then(Value::as_str).and_then(parse_css_color);
            let background = item
                .get("background")
                .and_then(Value::as_str)
                .map_or(Some(Color::WHITE), parse_css_color);
            let context = item.get("context").and_then(Value::as_str).unwrap_or("");
            match (color, background) {
                (Some(fg), Some(bg)) => analysis.add_pair(fg, bg, context, curve),
                _ => analysis.skipped += 1,
            }
        }
        Ok(analysis)
    }
}

/// Impact label attached to audit-engine violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Minor
    Minor,
    /// Moderate
    Moderate,
    /// Serious
    Serious,
    /// Critical
    Critical,
}

impl Impact {
    /// Parse the engine's impact string; unknown labels yield `None`
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "serious" => Some(Self::Serious),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Serious => "serious",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule violation reported by the audit engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule id (e.g. "color-contrast")
    pub id: String,
    /// Engine impact, if reported
    pub impact: Option<Impact>,
    /// Rule description
    pub description: String,
    /// Short remediation hint
    pub help: String,
    /// Number of offending nodes
    pub nodes: usize,
}

/// Interpreted audit-engine result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Violations
    pub violations: Vec<Violation>,
    /// Rules that passed
    pub passes: usize,
    /// Rules needing manual review
    pub incomplete: usize,
    /// Rules that did not apply
    pub inapplicable: usize,
}

impl AuditReport {
    /// Interpret `{violations[], passes, incomplete, inapplicable}`.
    ///
    /// The three counters may be arrays (raw engine output) or numbers.
    ///
    /// # Errors
    ///
    /// Returns error if `violations` is missing or not an array
    pub fn from_json(value: &Value) -> PreflightResult<Self> {
        let raw = value
            .get("violations")
            .and_then(Value::as_array)
            .ok_or_else(|| PreflightError::AuditError {
                message: "audit result has no violations array".to_string(),
            })?;

        let text = |v: &Value, key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let violations = raw
            .iter()
            .map(|v| Violation {
                id: text(v, "id"),
                impact: v.get("impact").and_then(Value::as_str).and_then(Impact::parse),
                description: text(v, "description"),
                help: text(v, "help"),
                nodes: match v.get("nodes") {
                    Some(Value::Array(nodes)) => nodes.len(),
                    Some(n) => n.as_u64().map_or(0, |n| n as usize),
                    None => 0,
                },
            })
            .collect();

        let tally = |key: &str| match value.get(key) {
            Some(Value::Array(items)) => items.len(),
            Some(n) => n.as_u64().map_or(0, |n| n as usize),
            None => 0,
        };

        Ok(Self {
            violations,
            passes: tally("passes"),
            incomplete: tally("incomplete"),
            inapplicable: tally("inapplicable"),
        })
    }

    /// Whether the audit found no violations
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Rule selection handed to the audit engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRules {
    /// Rule tags to run
    pub tags: Vec<String>,
}

impl Default for AuditRules {
    fn default() -> Self {
        Self {
            tags: vec![
                "wcag2a".to_string(),
                "wcag2aa".to_string(),
                "wcag21aa".to_string(),
            ],
        }
    }
}

/// Accessibility audit engine consumed by the accessibility stage
#[async_trait]
pub trait AuditEngine: Send + Sync {
    /// Audit the document currently loaded in `driver`
    async fn run_audit(
        &self,
        driver: &mut dyn BrowserDriver,
        rules: &AuditRules,
    ) -> PreflightResult<AuditReport>;
}

/// axe-core loaded into the page from a script URL
#[derive(Debug, Clone)]
pub struct AxeAuditEngine {
    script_url: String,
}

impl Default for AxeAuditEngine {
    fn default() -> Self {
        Self::new(AXE_CDN_URL)
    }
}

impl AxeAuditEngine {
    /// Create an engine loading axe-core from `script_url`
    #[must_use]
    pub fn new(script_url: impl Into<String>) -> Self {
        Self {
            script_url: script_url.into(),
        }
    }

    /// Script location
    #[must_use]
    pub fn script_url(&self) -> &str {
        &self.script_url
    }
}

#[async_trait]
impl AuditEngine for AxeAuditEngine {
    async fn run_audit(
        &self,
        driver: &mut dyn BrowserDriver,
        rules: &AuditRules,
    ) -> PreflightResult<AuditReport> {
        driver
            .evaluate(&scripts::inject_axe(&self.script_url))
            .await
            .map_err(|e| PreflightError::AuditError {
                message: e.to_string(),
            })?;
        let raw = driver.evaluate(&scripts::run_axe(&rules.tags)).await?;
        AuditReport::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;
    use serde_json::json;

    mod color_tests {
        use super::*;

        #[test]
        fn test_color_from_hex() {
            let color = Color::from_hex(0x00FF_5500);
            assert_eq!(color.r, 255);
            assert_eq!(color.g, 0x55);
            assert_eq!(color.b, 0);
        }

        #[test]
        fn test_contrast_ratio_black_white() {
            for curve in [Linearization::Srgb, Linearization::Gamma22] {
                let ratio = Color::new(0, 0, 0).contrast_ratio(&Color::WHITE, curve);
                assert!((ratio - 21.0).abs() < 0.01);
            }
        }

        #[test]
        fn test_contrast_ratio_same_color() {
            let red = Color::new(255, 0, 0);
            let ratio = red.contrast_ratio(&red, Linearization::Gamma22);
            assert!((ratio - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_contrast_is_symmetric() {
            let a = Color::new(30, 60, 90);
            let b = Color::new(200, 180, 160);
            let curve = Linearization::Gamma22;
            assert!((a.contrast_ratio(&b, curve) - b.contrast_ratio(&a, curve)).abs() < 1e-12);
        }

        #[test]
        fn test_mid_grey_on_white_fails_aa() {
            // rgb(118,118,118) on white sits at roughly 4.48:1
            let grey = Color::new(118, 118, 118);
            let ratio = grey.contrast_ratio(&Color::WHITE, Linearization::Gamma22);
            assert!(ratio < MIN_CONTRAST_NORMAL);
            assert!((ratio - 4.48).abs() < 0.05);
            assert!(!grey.meets_wcag_aa_normal(&Color::WHITE, Linearization::Gamma22));
        }

        #[test]
        fn test_mid_grey_exact_curve_is_borderline_pass() {
            let grey = Color::new(118, 118, 118);
            let ratio = grey.contrast_ratio(&Color::WHITE, Linearization::Srgb);
            assert!(ratio >= MIN_CONTRAST_NORMAL);
            assert!(ratio < 4.6);
        }

        #[test]
        fn test_display() {
            assert_eq!(Color::new(1, 2, 3).to_string(), "rgb(1, 2, 3)");
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_rgb() {
            assert_eq!(
                parse_css_color("rgb(118, 118, 118)"),
                Some(Color::new(118, 118, 118))
            );
        }

        #[test]
        fn test_parse_rgba_opaque_and_transparent() {
            assert_eq!(
                parse_css_color("rgba(10,20,30,0.5)"),
                Some(Color::new(10, 20, 30))
            );
            assert_eq!(parse_css_color("rgba(0, 0, 0, 0)"), None);
        }

        #[test]
        fn test_parse_hex() {
            assert_eq!(parse_css_color("#ff5500"), Some(Color::new(255, 0x55, 0)));
            assert_eq!(parse_css_color("#fff"), Some(Color::WHITE));
            assert_eq!(parse_css_color("#ffff"), None);
        }

        #[test]
        fn test_parse_garbage() {
            assert_eq!(parse_css_color("transparent"), None);
            assert_eq!(parse_css_color("rgb(300, 0, 0)"), None);
        }
    }

    mod contrast_analysis_tests {
        use super::*;

        #[test]
        fn test_from_sample_flags_low_contrast() {
            let sample = json!([
                {"color": "rgb(0, 0, 0)", "background": "rgb(255, 255, 255)", "context": "p: ok"},
                {"color": "rgb(118, 118, 118)", "background": "rgb(255, 255, 255)", "context": "span: faint"},
                {"color": "transparent", "background": "rgb(255, 255, 255)", "context": "a: hidden"}
            ]);
            let analysis = ContrastAnalysis::from_sample(&sample, Linearization::Gamma22).unwrap();
            assert_eq!(analysis.pairs_analyzed, 2);
            assert_eq!(analysis.skipped, 1);
            assert_eq!(analysis.failing_pairs.len(), 1);
            assert_eq!(analysis.failing_pairs[0].context, "span: faint");
            assert!(!analysis.passes_wcag_aa());
        }

        #[test]
        fn test_missing_background_defaults_to_white() {
            let sample = json!([{"color": "rgb(0, 0, 0)", "context": "p"}]);
            let analysis = ContrastAnalysis::from_sample(&sample, Linearization::Srgb).unwrap();
            assert!((analysis.min_ratio - 21.0).abs() < 0.01);
            assert!(analysis.passes_wcag_aa());
        }

        #[test]
        fn test_non_array_sample_errors() {
            assert!(ContrastAnalysis::from_sample(&json!(null), Linearization::Srgb).is_err());
        }
    }

    mod audit_tests {
        use super::*;

        #[test]
        fn test_impact_parse() {
            assert_eq!(Impact::parse("serious"), Some(Impact::Serious));
            assert_eq!(Impact::parse("CRITICAL"), Some(Impact::Critical));
            assert_eq!(Impact::parse("unknown"), None);
            assert!(Impact::Critical > Impact::Minor);
        }

        #[test]
        fn test_report_from_raw_engine_shape() {
            let raw = json!({
                "violations": [{
                    "id": "color-contrast",
                    "impact": "serious",
                    "description": "Elements must meet contrast",
                    "help": "Fix contrast",
                    "nodes": [{}, {}]
                }, {
                    "id": "region",
                    "impact": null,
                    "nodes": 1
                }],
                "passes": [{}, {}, {}],
                "incomplete": 1,
                "inapplicable": []
            });
            let report = AuditReport::from_json(&raw).unwrap();
            assert_eq!(report.violations.len(), 2);
            assert_eq!(report.violations[0].impact, Some(Impact::Serious));
            assert_eq!(report.violations[0].nodes, 2);
            assert_eq!(report.violations[1].impact, None);
            assert_eq!(report.violations[1].nodes, 1);
            assert_eq!(report.passes, 3);
            assert_eq!(report.incomplete, 1);
            assert_eq!(report.inapplicable, 0);
            assert!(!report.is_clean());
        }

        #[test]
        fn test_report_without_violations_errors() {
            assert!(AuditReport::from_json(&json!({"passes": 3})).is_err());
        }

        #[tokio::test]
        async fn test_axe_engine_injects_then_runs() {
            let rules = AuditRules::default();
            let engine = AxeAuditEngine::default();
            let mut driver = ScriptedDriver::new()
                .with_script(scripts::inject_axe(engine.script_url()), json!(true))
                .with_script(
                    scripts::run_axe(&rules.tags),
                    json!({"violations": [], "passes": 12, "incomplete": 0, "inapplicable": 40}),
                );
            let report = engine.run_audit(&mut driver, &rules).await.unwrap();
            assert!(report.is_clean());
            assert_eq!(report.passes, 12);
            assert_eq!(driver.call_count("evaluate"), 2);
        }

        #[tokio::test]
        async fn test_axe_engine_load_failure_is_audit_error() {
            let mut driver = ScriptedDriver::new();
            let err = AxeAuditEngine::default()
                .run_audit(&mut driver, &AuditRules::default())
                .await
                .unwrap_err();
            assert!(matches!(err, PreflightError::AuditError { .. }));
        }
    }
}
