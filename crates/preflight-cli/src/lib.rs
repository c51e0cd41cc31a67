//! Preflight CLI Library
//!
//! Command-line interface for the Preflight orchestrator: argument parsing,
//! configuration layering (defaults, YAML file, environment, flags), console
//! progress output and command execution.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    BaselineArgs, BaselineCommand, BrowserArgs, Cli, ColorArg, Commands, ConfigArgs, RunArgs,
    SuiteArgs, TargetArgs,
};
pub use config::{browser_config, resolve_suite_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{ConsoleObserver, ProgressReporter};
pub use runner::{refresh_baseline, PipelineRunner};
