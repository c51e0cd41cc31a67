//! CLI configuration

use crate::commands::{BrowserArgs, TargetArgs};
use crate::error::CliResult;
use preflight::{BrowserConfig, SuiteConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - every check is printed
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default `tracing` filter when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "preflight=error",
            Self::Normal => "preflight=info",
            Self::Verbose => "preflight=debug",
            Self::Debug => "preflight=trace,preflight_cli=trace",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }
}

/// Load the suite configuration: defaults, then the YAML file, then flags
/// (which already carry their `PREFLIGHT_*` environment fallbacks).
///
/// # Errors
///
/// Returns error if the file cannot be loaded or the result is invalid
pub fn resolve_suite_config(file: Option<&Path>, target: &TargetArgs) -> CliResult<SuiteConfig> {
    let mut config = match file {
        Some(path) => SuiteConfig::load(path)?,
        None => SuiteConfig::default(),
    };
    if let Some(base_url) = &target.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(output) = &target.output {
        config.output_dir.clone_from(output);
    }
    config.validate()?;
    Ok(config)
}

/// Browser launch configuration for a run
#[must_use]
pub fn browser_config(args: &BrowserArgs, suite: &SuiteConfig) -> BrowserConfig {
    let mut config = BrowserConfig::default().with_headless(!args.headed);
    config.operation_timeout_ms = suite.timeout_ms;
    if args.no_sandbox {
        config = config.with_no_sandbox();
    }
    if let Some(path) = &args.chromium_path {
        config = config.with_chromium_path(path.clone());
    }
    config
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 3), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
        }

        #[test]
        fn test_is_verbose() {
            assert!(!Verbosity::Quiet.is_verbose());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
            assert!(Verbosity::Quiet.is_quiet());
        }

        #[test]
        fn test_log_filter() {
            assert_eq!(Verbosity::Normal.log_filter(), "preflight=info");
            assert_eq!(Verbosity::Quiet.log_filter(), "preflight=error");
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_explicit_choices() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_defaults_without_file() {
            let config = resolve_suite_config(None, &TargetArgs::default()).unwrap();
            assert_eq!(config, SuiteConfig::default());
        }

        #[test]
        fn test_flags_override_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("preflight.yaml");
            std::fs::write(&path, "base_url: http://localhost:19006\niterations: 5\n").unwrap();

            let from_file = resolve_suite_config(Some(&path), &TargetArgs::default()).unwrap();
            assert_eq!(from_file.base_url, "http://localhost:19006");
            assert_eq!(from_file.iterations, 5);

            let target = TargetArgs {
                base_url: Some("https://staging.learnapp.dev".to_string()),
                output: Some(PathBuf::from("ci-results")),
            };
            let merged = resolve_suite_config(Some(&path), &target).unwrap();
            assert_eq!(merged.base_url, "https://staging.learnapp.dev");
            assert_eq!(merged.output_dir, PathBuf::from("ci-results"));
            assert_eq!(merged.iterations, 5);
        }

        #[test]
        fn test_invalid_override_rejected() {
            let target = TargetArgs {
                base_url: Some("localhost:8081".to_string()),
                output: None,
            };
            assert!(resolve_suite_config(None, &target).is_err());
        }

        #[test]
        fn test_missing_file() {
            let missing = Path::new("/nonexistent/preflight.yaml");
            assert!(resolve_suite_config(Some(missing), &TargetArgs::default()).is_err());
        }
    }

    mod browser_config_tests {
        use super::*;

        #[test]
        fn test_browser_flags() {
            let args = BrowserArgs {
                headed: true,
                no_sandbox: true,
                chromium_path: Some("/usr/bin/chromium".to_string()),
            };
            let config = browser_config(&args, &SuiteConfig::default());
            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
            assert_eq!(config.operation_timeout_ms, 30_000);
        }
    }
}
