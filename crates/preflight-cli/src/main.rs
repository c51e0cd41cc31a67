//! Preflight CLI: production-readiness checks from the command line
//!
//! ## Usage
//!
//! ```bash
//! preflight run                                 # Full pipeline, exit 0 when ready
//! preflight run --base-url http://localhost:19006 --skip-e2e
//! preflight suite --json                        # Core stages only
//! preflight baseline refresh home-mobile shot.png
//! preflight config > preflight.yaml             # Effective configuration
//! ```

use clap::Parser;
use preflight::SuiteConfig;
use preflight_cli::{
    refresh_baseline, resolve_suite_config, BaselineCommand, Cli, CliConfig, CliResult,
    ColorChoice, Commands, PipelineRunner, TargetArgs, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .with_target(false)
        .init();

    match run(cli, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: CliConfig) -> CliResult<u8> {
    let file = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => {
            let suite = resolve_suite_config(file, &args.target)?;
            PipelineRunner::new(config, suite).run(&args).await
        }
        Commands::Suite(args) => {
            let suite = resolve_suite_config(file, &args.target)?;
            PipelineRunner::new(config, suite).suite(&args).await
        }
        Commands::Baseline(args) => match args.command {
            BaselineCommand::Refresh { key, png, output } => {
                let target = TargetArgs {
                    base_url: None,
                    output,
                };
                let suite = resolve_suite_config(file, &target)?;
                let path = refresh_baseline(&suite, &key, &png)?;
                println!("{}", path.display());
                Ok(0)
            }
        },
        Commands::Config(args) => {
            let suite = if args.defaults {
                SuiteConfig::default()
            } else {
                resolve_suite_config(file, &args.target)?
            };
            print!("{}", suite.to_yaml()?);
            Ok(0)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}
