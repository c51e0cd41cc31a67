//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Preflight: production-readiness checks for the mobile learning app
#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// YAML configuration file
    #[arg(short, long, env = "PREFLIGHT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: server check, every stage, reports
    Run(RunArgs),

    /// Run the core suite only (no server check, no E2E, no artifacts)
    Suite(SuiteArgs),

    /// Manage visual regression baselines
    Baseline(BaselineArgs),

    /// Show the effective configuration as YAML
    Config(ConfigArgs),
}

/// Where the app lives and where results go
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Base URL of the app under test
    #[arg(long, env = "PREFLIGHT_BASE_URL")]
    pub base_url: Option<String>,

    /// Output directory for reports and screenshots
    #[arg(short, long, env = "PREFLIGHT_OUTPUT_DIR")]
    pub output: Option<PathBuf>,
}

/// Browser launch options
#[derive(Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium binary (auto-detected when absent)
    #[arg(long, env = "PREFLIGHT_CHROMIUM")]
    pub chromium_path: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Target options
    #[command(flatten)]
    pub target: TargetArgs,

    /// Browser options
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Never start the app server, only wait for it
    #[arg(long)]
    pub no_server_start: bool,

    /// Skip the external E2E suite
    #[arg(long)]
    pub skip_e2e: bool,
}

/// Arguments for the suite command
#[derive(Parser, Debug)]
pub struct SuiteArgs {
    /// Target options
    #[command(flatten)]
    pub target: TargetArgs,

    /// Browser options
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Print the suite report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the baseline command
#[derive(Parser, Debug)]
pub struct BaselineArgs {
    /// Baseline action
    #[command(subcommand)]
    pub command: BaselineCommand,
}

/// Baseline actions
#[derive(Subcommand, Debug)]
pub enum BaselineCommand {
    /// Replace one baseline with a PNG file
    Refresh {
        /// Screenshot key (e.g. `home-mobile`)
        key: String,

        /// Replacement PNG
        png: PathBuf,

        /// Output directory holding `screenshots/baseline`
        #[arg(short, long, env = "PREFLIGHT_OUTPUT_DIR")]
        output: Option<PathBuf>,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Ignore the config file and print built-in defaults
    #[arg(long)]
    pub defaults: bool,

    /// Target options
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_command() {
            let cli = Cli::parse_from(["preflight", "run"]);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert!(!args.no_server_start);
            assert!(!args.skip_e2e);
            assert!(args.target.base_url.is_none());
        }

        #[test]
        fn test_parse_run_flags() {
            let cli = Cli::parse_from([
                "preflight",
                "run",
                "--base-url",
                "http://localhost:19006",
                "--output",
                "out",
                "--no-server-start",
                "--skip-e2e",
                "--no-sandbox",
            ]);
            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.target.base_url.as_deref(), Some("http://localhost:19006"));
            assert_eq!(args.target.output, Some(PathBuf::from("out")));
            assert!(args.no_server_start);
            assert!(args.skip_e2e);
            assert!(args.browser.no_sandbox);
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["preflight", "-vv", "--color", "never", "suite"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(matches!(cli.command, Commands::Suite(_)));
        }

        #[test]
        fn test_config_flag_is_global() {
            let cli = Cli::parse_from(["preflight", "config", "--config", "preflight.yaml"]);
            assert_eq!(cli.config, Some(PathBuf::from("preflight.yaml")));
        }

        #[test]
        fn test_parse_baseline_refresh() {
            let cli =
                Cli::parse_from(["preflight", "baseline", "refresh", "home-mobile", "shot.png"]);
            let Commands::Baseline(BaselineArgs {
                command: BaselineCommand::Refresh { key, png, output },
            }) = cli.command
            else {
                panic!("expected baseline refresh");
            };
            assert_eq!(key, "home-mobile");
            assert_eq!(png, PathBuf::from("shot.png"));
            assert!(output.is_none());
        }
    }

    mod color_tests {
        use super::*;
        use crate::config::ColorChoice;

        #[test]
        fn test_color_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }
    }
}
