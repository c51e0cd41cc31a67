//! Visual regression testing with real image comparison.
//!
//! Screenshots are compared against a baseline stored per screenshot key under
//! `<screenshots>/baseline/<key>.png`. The first capture for a key becomes its
//! baseline and passes; later captures are diffed pixel by pixel using a YIQ
//! colour distance with anti-aliasing detection, the same contract as
//! pixelmatch. Baselines are only replaced through
//! [`BaselineComparator::refresh_baseline`].

use crate::config::SuiteConfig;
use crate::result::{PreflightError, PreflightResult};
use image::{ImageEncoder, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest possible YIQ delta between two colours
const MAX_YIQ_DELTA: f64 = 35215.0;

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const AA_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
const GRAY_ALPHA: f64 = 0.1;

/// Comparator settings
#[derive(Debug, Clone, PartialEq)]
pub struct ComparatorConfig {
    /// Maximum differing-pixel percentage that still passes
    pub max_diff_percent: f64,
    /// Per-pixel colour distance tolerance (0..=1)
    pub pixel_threshold: f64,
    /// Count anti-aliased pixels as differences
    pub include_aa: bool,
    /// Root of `baseline/`, `diff/` and current captures
    pub screenshots_dir: PathBuf,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            max_diff_percent: 0.2,
            pixel_threshold: 0.1,
            include_aa: false,
            screenshots_dir: PathBuf::from("screenshots"),
        }
    }
}

impl ComparatorConfig {
    /// Derive from the suite configuration
    #[must_use]
    pub fn from_suite(config: &SuiteConfig) -> Self {
        Self {
            max_diff_percent: config.visual.max_diff_percent,
            pixel_threshold: config.visual.pixel_threshold,
            include_aa: config.visual.include_aa,
            screenshots_dir: config.screenshots_dir(),
        }
    }

    /// Set the screenshots directory
    #[must_use]
    pub fn with_screenshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshots_dir = dir.into();
        self
    }

    /// Set the pass threshold in percent
    #[must_use]
    pub const fn with_max_diff_percent(mut self, percent: f64) -> Self {
        self.max_diff_percent = percent;
        self
    }
}

/// Outcome of comparing one capture against its baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Sanitised screenshot key
    pub key: String,
    /// Within the configured threshold
    pub passed: bool,
    /// Differing pixels as a percentage of all pixels
    pub diff_percent: f64,
    /// Differing pixels, when a pixel diff ran
    pub diff_pixels: Option<usize>,
    /// Total pixels, when a pixel diff ran
    pub total_pixels: Option<usize>,
    /// This capture became the baseline
    pub is_new_baseline: bool,
    /// Why the comparison could not run
    pub error: Option<String>,
    /// Diff visualisation, written when any pixel differs
    pub diff_path: Option<PathBuf>,
}

impl Comparison {
    fn failed(key: &str, error: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            passed: false,
            diff_percent: 100.0,
            diff_pixels: None,
            total_pixels: None,
            is_new_baseline: false,
            error: Some(error.into()),
            diff_path: None,
        }
    }

    fn new_baseline(key: &str) -> Self {
        Self {
            key: key.to_string(),
            passed: true,
            diff_percent: 0.0,
            diff_pixels: None,
            total_pixels: None,
            is_new_baseline: true,
            error: None,
            diff_path: None,
        }
    }
}

/// Result of a pixel-level diff between equally sized images
#[derive(Debug, Clone)]
pub struct PixelDiff {
    /// Pixels counted as different
    pub diff_pixels: usize,
    /// Pixels treated as anti-aliasing and ignored
    pub aa_pixels: usize,
    /// Total pixels
    pub total_pixels: usize,
    /// Red for differences, yellow for anti-aliasing, faded grey otherwise
    pub diff_image: RgbaImage,
}

impl PixelDiff {
    /// Differing pixels in percent
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn diff_percent(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.diff_pixels as f64 / self.total_pixels as f64 * 100.0
        }
    }
}

/// Compares captures against stored baselines
#[derive(Debug, Clone, Default)]
pub struct BaselineComparator {
    config: ComparatorConfig,
}

impl BaselineComparator {
    /// Create a comparator
    #[must_use]
    pub const fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Where the baseline for `key` lives
    #[must_use]
    pub fn baseline_path(&self, key: &str) -> PathBuf {
        self.config
            .screenshots_dir
            .join("baseline")
            .join(format!("{}.png", sanitize_key(key)))
    }

    fn current_path(&self, key: &str) -> PathBuf {
        self.config.screenshots_dir.join(format!("{key}.png"))
    }

    fn diff_path(&self, key: &str) -> PathBuf {
        self.config
            .screenshots_dir
            .join("diff")
            .join(format!("{key}-diff.png"))
    }

    /// Compare a captured PNG with the baseline for `key`.
    ///
    /// Never fails: I/O and decoding problems produce a failing
    /// [`Comparison`] carrying the error.
    #[must_use]
    pub fn compare(&self, key: &str, captured: &[u8]) -> Comparison {
        let key = sanitize_key(key);
        self.try_compare(&key, captured)
            .unwrap_or_else(|e| Comparison::failed(&key, e.to_string()))
    }

    fn try_compare(&self, key: &str, captured: &[u8]) -> PreflightResult<Comparison> {
        let actual = decode(captured, "captured")?;
        write_file(&self.current_path(key), captured)?;

        let baseline_path = self.baseline_path(key);
        if !baseline_path.exists() {
            write_file(&baseline_path, captured)?;
            info!(key, path = %baseline_path.display(), "new baseline stored");
            return Ok(Comparison::new_baseline(key));
        }

        let expected = decode(&std::fs::read(&baseline_path)?, "baseline")?;
        if actual.dimensions() != expected.dimensions() {
            debug!(
                key,
                actual = ?actual.dimensions(),
                baseline = ?expected.dimensions(),
                "size mismatch"
            );
            return Ok(Comparison::failed(key, "size mismatch"));
        }

        let diff = diff_images(
            &actual,
            &expected,
            self.config.pixel_threshold,
            self.config.include_aa,
        );
        let diff_percent = diff.diff_percent();

        let diff_path = if diff.diff_pixels > 0 {
            let path = self.diff_path(key);
            write_file(&path, &encode_png(&diff.diff_image)?)?;
            Some(path)
        } else {
            None
        };

        Ok(Comparison {
            key: key.to_string(),
            passed: diff_percent <= self.config.max_diff_percent,
            diff_percent,
            diff_pixels: Some(diff.diff_pixels),
            total_pixels: Some(diff.total_pixels),
            is_new_baseline: false,
            error: None,
            diff_path,
        })
    }

    /// Replace the baseline for `key` with `png`.
    ///
    /// # Errors
    ///
    /// Returns error if `png` does not decode or cannot be written
    pub fn refresh_baseline(&self, key: &str, png: &[u8]) -> PreflightResult<PathBuf> {
        decode(png, "replacement baseline")?;
        let path = self.baseline_path(key);
        write_file(&path, png)?;
        info!(key, path = %path.display(), "baseline refreshed");
        Ok(path)
    }
}

/// Normalise a screenshot key to lowercase alphanumerics and `-`,
/// collapsing runs of other characters into one `-`.
#[must_use]
pub fn sanitize_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            key.push(c);
        } else if !key.ends_with('-') {
            key.push('-');
        }
    }
    let trimmed = key.trim_matches('-');
    if trimmed.is_empty() {
        "screenshot".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Key for a page captured under a variant (viewport, breakpoint or theme)
///
/// Identities that are already in key form map to themselves. Anything
/// sanitizing would alter gets an 8-hex-digit suffix hashed from the raw
/// pair, so distinct identities never share a baseline.
#[must_use]
pub fn screenshot_key(page: &str, variant: &str) -> String {
    let raw = format!("{page}-{variant}");
    let key = sanitize_key(&raw);
    if key == raw {
        return key;
    }
    let hash = blake3::hash(format!("{page}\0{variant}").as_bytes()).to_hex();
    format!("{key}-{}", &hash[..8])
}

fn decode(bytes: &[u8], what: &str) -> PreflightResult<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| PreflightError::ImageComparisonError {
            message: format!("Failed to decode {what} image: {e}"),
        })
}

/// Encode an RGBA buffer as PNG
///
/// # Errors
///
/// Returns error if encoding fails
pub fn encode_png(img: &RgbaImage) -> PreflightResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| PreflightError::ImageComparisonError {
            message: format!("Failed to encode diff image: {e}"),
        })?;
    Ok(buffer)
}

fn write_file(path: &Path, bytes: &[u8]) -> PreflightResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Diff two equally sized images.
///
/// A pixel differs when its YIQ colour delta exceeds
/// `35215 * pixel_threshold^2`. Unless `include_aa` is set, differing pixels
/// that look like anti-aliasing in either image are reported separately and
/// not counted.
#[must_use]
pub fn diff_images(
    actual: &RgbaImage,
    expected: &RgbaImage,
    pixel_threshold: f64,
    include_aa: bool,
) -> PixelDiff {
    let (width, height) = actual.dimensions();
    let max_delta = MAX_YIQ_DELTA * pixel_threshold * pixel_threshold;
    let mut diff_image = RgbaImage::new(width, height);
    let mut diff_pixels = 0;
    let mut aa_pixels = 0;

    for y in 0..height {
        for x in 0..width {
            let a = *actual.get_pixel(x, y);
            let delta = color_delta(a, *expected.get_pixel(x, y), false);

            let out = if delta.abs() > max_delta {
                if !include_aa
                    && (antialiased(actual, x, y, expected) || antialiased(expected, x, y, actual))
                {
                    aa_pixels += 1;
                    AA_COLOR
                } else {
                    diff_pixels += 1;
                    DIFF_COLOR
                }
            } else {
                gray_pixel(a)
            };
            diff_image.put_pixel(x, y, out);
        }
    }

    PixelDiff {
        diff_pixels,
        aa_pixels,
        total_pixels: (width as usize) * (height as usize),
        diff_image,
    }
}

fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

fn blended(px: Rgba<u8>) -> (f64, f64, f64) {
    let Rgba([r, g, b, a]) = px;
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a < 255 {
        let a = f64::from(a) / 255.0;
        (blend(r, a), blend(g, a), blend(b, a))
    } else {
        (r, g, b)
    }
}

/// Signed YIQ distance between two pixels (negative when `a` is brighter).
/// With `y_only` set, only the brightness difference is returned.
fn color_delta(a: Rgba<u8>, b: Rgba<u8>, y_only: bool) -> f64 {
    if a == b {
        return 0.0;
    }
    let (r1, g1, b1) = blended(a);
    let (r2, g2, b2) = blended(b);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

fn gray_pixel(px: Rgba<u8>) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = px;
    let y = rgb2y(f64::from(r), f64::from(g), f64::from(b));
    let value = blend(y, GRAY_ALPHA * f64::from(a) / 255.0).clamp(0.0, 255.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let v = value.round() as u8;
    Rgba([v, v, v, 255])
}

fn neighbourhood(x: u32, y: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(width - 1),
        (y + 1).min(height - 1),
    )
}

/// Whether the pixel at (x, y) in `img` looks like an anti-aliased edge
/// between two regions that are flat in both images.
fn antialiased(img: &RgbaImage, x1: u32, y1: u32, other: &RgbaImage) -> bool {
    let (width, height) = img.dimensions();
    let (x0, y0, x2, y2) = neighbourhood(x1, y1, width, height);
    let center = *img.get_pixel(x1, y1);

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let (mut min, mut max) = (0.0_f64, 0.0_f64);
    let (mut min_at, mut max_at) = ((0, 0), (0, 0));

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(center, *img.get_pixel(x, y), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_at = (x, y);
            } else if delta > max {
                max = delta;
                max_at = (x, y);
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    let flat_in_both =
        |(x, y): (u32, u32)| has_many_siblings(img, x, y) && has_many_siblings(other, x, y);
    flat_in_both(min_at) || flat_in_both(max_at)
}

/// Whether at least three neighbours share the exact colour of (x, y)
fn has_many_siblings(img: &RgbaImage, x1: u32, y1: u32) -> bool {
    let (width, height) = img.dimensions();
    let (x0, y0, x2, y2) = neighbourhood(x1, y1, width, height);
    let center = img.get_pixel(x1, y1);

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            if img.get_pixel(x, y) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        encode_png(&img).unwrap()
    }

    fn comparator(dir: &Path) -> BaselineComparator {
        BaselineComparator::new(ComparatorConfig::default().with_screenshots_dir(dir))
    }

    mod key_tests {
        use super::*;

        #[test]
        fn test_sanitize_key() {
            assert_eq!(sanitize_key("Home / Mobile@Dark"), "home-mobile-dark");
            assert_eq!(sanitize_key("--lessons__tablet--"), "lessons-tablet");
            assert_eq!(sanitize_key("***"), "screenshot");
        }

        #[test]
        fn test_sanitize_keeps_unicode_letters() {
            assert_eq!(sanitize_key("首页 Mobile"), "首页-mobile");
            assert_eq!(sanitize_key("Übersicht"), "übersicht");
        }

        #[test]
        fn test_screenshot_key_is_deterministic() {
            assert_eq!(screenshot_key("quiz", "375x667"), "quiz-375x667");
            assert_eq!(screenshot_key("Quiz", "dark"), screenshot_key("Quiz", "dark"));
        }

        #[test]
        fn test_distinct_identities_get_distinct_keys() {
            assert_ne!(screenshot_key("首页", "mobile"), screenshot_key("课程", "mobile"));
            assert_ne!(
                screenshot_key("Home Page", "mobile"),
                screenshot_key("home-page", "mobile")
            );
            assert_ne!(screenshot_key("★", "mobile"), screenshot_key("☆", "mobile"));
        }

        #[test]
        fn test_altered_key_is_stable_and_file_safe() {
            let key = screenshot_key("Home Page", "mobile");
            assert!(key.starts_with("home-page-mobile-"));
            assert_eq!(key.len(), "home-page-mobile-".len() + 8);
            assert_eq!(sanitize_key(&key), key);
        }

        #[test]
        fn test_distinct_pages_keep_separate_baselines() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            let first = cmp.compare(
                &screenshot_key("首页", "mobile"),
                &solid_png(4, 4, [0, 0, 0, 255]),
            );
            let second = cmp.compare(
                &screenshot_key("课程", "mobile"),
                &solid_png(4, 4, [255, 255, 255, 255]),
            );
            assert!(first.is_new_baseline);
            assert!(second.is_new_baseline);
            assert!(second.passed);
        }
    }

    mod bootstrap_tests {
        use super::*;

        #[test]
        fn test_first_capture_becomes_baseline_then_matches() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            let png = solid_png(4, 4, [10, 20, 30, 255]);

            let first = cmp.compare("home-mobile", &png);
            assert!(first.passed);
            assert!(first.is_new_baseline);
            assert_eq!(first.diff_percent, 0.0);
            assert!(cmp.baseline_path("home-mobile").exists());

            let second = cmp.compare("home-mobile", &png);
            assert!(second.passed);
            assert!(!second.is_new_baseline);
            assert_eq!(second.diff_percent, 0.0);
            assert_eq!(second.diff_pixels, Some(0));
            assert!(second.diff_path.is_none());
        }

        #[test]
        fn test_regression_in_first_capture_goes_unnoticed() {
            // The first capture is trusted as ground truth, whatever it shows.
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            let broken = solid_png(4, 4, [255, 0, 255, 255]);
            assert!(cmp.compare("quiz-mobile", &broken).passed);
            assert!(cmp.compare("quiz-mobile", &broken).passed);
        }

        #[test]
        fn test_compare_never_overwrites_baseline() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            let original = solid_png(4, 4, [0, 0, 0, 255]);
            let changed = solid_png(4, 4, [255, 255, 255, 255]);
            cmp.compare("k", &original);
            let result = cmp.compare("k", &changed);
            assert!(!result.passed);
            assert_eq!(std::fs::read(cmp.baseline_path("k")).unwrap(), original);
            assert_eq!(std::fs::read(dir.path().join("k.png")).unwrap(), changed);
        }
    }

    mod comparison_tests {
        use super::*;

        #[test]
        fn test_dimension_mismatch_short_circuits() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            cmp.compare("k", &solid_png(4, 4, [0, 0, 0, 255]));
            let result = cmp.compare("k", &solid_png(4, 5, [0, 0, 0, 255]));
            assert!(!result.passed);
            assert_eq!(result.diff_percent, 100.0);
            assert_eq!(result.error.as_deref(), Some("size mismatch"));
            assert_eq!(result.diff_pixels, None);
            assert!(!dir.path().join("diff").exists());
        }

        #[test]
        fn test_changed_pixels_write_diff_image() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            cmp.compare("k", &solid_png(10, 10, [255, 255, 255, 255]));

            let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
            img.put_pixel(5, 5, Rgba([0, 0, 0, 255]));
            let result = cmp.compare("k", &encode_png(&img).unwrap());

            assert_eq!(result.diff_pixels, Some(1));
            assert_eq!(result.total_pixels, Some(100));
            assert!((result.diff_percent - 1.0).abs() < 1e-9);
            assert!(!result.passed);
            let diff_path = result.diff_path.unwrap();
            assert!(diff_path.ends_with("diff/k-diff.png"));
            assert!(diff_path.exists());
        }

        #[test]
        fn test_small_change_within_threshold_passes() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = BaselineComparator::new(
                ComparatorConfig::default()
                    .with_screenshots_dir(dir.path())
                    .with_max_diff_percent(1.0),
            );
            cmp.compare("k", &solid_png(10, 10, [255, 255, 255, 255]));
            let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
            img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
            let result = cmp.compare("k", &encode_png(&img).unwrap());
            assert!(result.passed);
            assert!(result.diff_path.is_some());
        }

        #[test]
        fn test_undecodable_capture_fails_without_baseline() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            let result = cmp.compare("k", b"not a png");
            assert!(!result.passed);
            assert!(result.error.unwrap().contains("decode"));
            assert!(!cmp.baseline_path("k").exists());
        }

        #[test]
        fn test_refresh_baseline_replaces() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = comparator(dir.path());
            cmp.compare("k", &solid_png(4, 4, [0, 0, 0, 255]));
            let replacement = solid_png(4, 4, [255, 255, 255, 255]);
            cmp.refresh_baseline("k", &replacement).unwrap();
            assert!(cmp.compare("k", &replacement).passed);
            assert!(cmp.refresh_baseline("k", b"junk").is_err());
        }
    }

    mod pixel_tests {
        use super::*;

        #[test]
        fn test_identical_images_have_no_diff() {
            let img = RgbaImage::from_pixel(3, 3, Rgba([12, 34, 56, 255]));
            let diff = diff_images(&img, &img, 0.1, false);
            assert_eq!(diff.diff_pixels, 0);
            assert_eq!(diff.diff_percent(), 0.0);
        }

        #[test]
        fn test_subtle_color_shift_is_tolerated() {
            let a = RgbaImage::from_pixel(3, 3, Rgba([200, 200, 200, 255]));
            let b = RgbaImage::from_pixel(3, 3, Rgba([202, 201, 200, 255]));
            assert_eq!(diff_images(&a, &b, 0.1, false).diff_pixels, 0);
            assert_eq!(diff_images(&a, &b, 0.0, false).diff_pixels, 9);
        }

        #[test]
        fn test_color_delta_sign_follows_brightness() {
            let white = Rgba([255, 255, 255, 255]);
            let black = Rgba([0, 0, 0, 255]);
            assert!(color_delta(white, black, false) < 0.0);
            assert!(color_delta(black, white, false) > 0.0);
            let full = color_delta(black, white, false);
            assert!(full > 32_000.0 && full <= MAX_YIQ_DELTA);
        }

        #[test]
        fn test_transparent_pixels_blend_over_white() {
            let clear = Rgba([0, 0, 0, 0]);
            let white = Rgba([255, 255, 255, 255]);
            assert!(color_delta(clear, white, false).abs() < f64::EPSILON);
        }

        #[test]
        fn test_antialiased_edge_is_not_counted() {
            // Black | white halves with a grey edge column that moved slightly.
            let make = |edge: u8| {
                RgbaImage::from_fn(8, 8, |x, _| match x {
                    0..=3 => Rgba([0, 0, 0, 255]),
                    4 => Rgba([edge, edge, edge, 255]),
                    _ => Rgba([255, 255, 255, 255]),
                })
            };
            let a = make(100);
            let b = make(180);
            let diff = diff_images(&a, &b, 0.1, false);
            assert_eq!(diff.diff_pixels, 0);
            assert_eq!(diff.aa_pixels, 8);
            assert_eq!(diff_images(&a, &b, 0.1, true).diff_pixels, 8);
        }

        #[test]
        fn test_diff_image_marks_differences_red() {
            let a = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 255]));
            let mut b = a.clone();
            b.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
            let diff = diff_images(&a, &b, 0.1, false);
            assert_eq!(*diff.diff_image.get_pixel(1, 1), DIFF_COLOR);
            assert_eq!(*diff.diff_image.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        }
    }
}
