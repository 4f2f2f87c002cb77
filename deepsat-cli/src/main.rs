//! DeepSat CLI
//!
//! Command-line launcher for the hyperspectral preprocessing job.

mod args;
mod commands;
mod config;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use deepsat_core::ConfigError;
use deepsat_runner::LaunchError;
use deepsat_runner::error::CONFIG_EXIT_CODE;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "deepsat")]
#[command(about = "DeepSat preprocessing job launcher", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: config::GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so `deepsat script` output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if cli.global.verbose {
                    "deepsat_cli=debug,deepsat_runner=debug".into()
                } else {
                    "deepsat_cli=info,deepsat_runner=info".into()
                }
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match config::load_config(&cli.global) {
        Ok(config) => handle_command(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Maps an error to the process exit code
///
/// Launch errors carry their own code (the program's code when it exited
/// non-zero). Configuration errors raised outside a launch (job file,
/// runner settings) share the launcher's configuration code; anything else
/// is a generic failure.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    let code = match error.downcast_ref::<LaunchError>() {
        Some(launch) => launch.exit_code(),
        None if error.downcast_ref::<ConfigError>().is_some() => CONFIG_EXIT_CODE,
        None => 1,
    };
    match u8::try_from(code) {
        Ok(0) | Err(_) => 1,
        Ok(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepsat_runner::InvocationError;

    #[test]
    fn test_exit_code_for_launch_errors() {
        let err = anyhow::Error::from(LaunchError::from(InvocationError::ExitStatus(42)));
        assert_eq!(exit_code_for(&err), 42);

        let err = anyhow::Error::from(LaunchError::from(ConfigError::EmptyField("src_file_name")))
            .context("Failed to launch job");
        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 1);

        let err = anyhow::Error::from(LaunchError::from(InvocationError::ExitStatus(256)));
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn test_invalid_job_file_exits_with_config_code() {
        let path = std::env::temp_dir().join(format!(
            "deepsat-bad-job-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"normalize_method": "zscore"}"#).unwrap();

        let args = args::JobArgs {
            job_file: Some(path.clone()),
            ..args::JobArgs::default()
        };
        let err = args
            .into_job_spec()
            .map_err(|e| e.context("Failed to launch job"))
            .unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn test_bad_runner_settings_exit_with_config_code() {
        let global = config::GlobalArgs {
            scheduler: Some("pbs".to_string()),
            ..config::GlobalArgs::default()
        };
        let err = config::load_config(&global).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Settings(_))
        ));
        assert_eq!(exit_code_for(&err), 2);

        let global = config::GlobalArgs {
            program: Some("   ".to_string()),
            ..config::GlobalArgs::default()
        };
        assert_eq!(exit_code_for(&config::load_config(&global).unwrap_err()), 2);
    }

    #[test]
    fn test_cli_parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "deepsat",
            "--scheduler",
            "local",
            "run",
            "--src-file-name",
            "mosaic_src",
            "--normalize-method",
            "minmax_scaling",
            "--time",
            "01:00:00",
        ])
        .unwrap();
        assert_eq!(cli.global.scheduler.as_deref(), Some("local"));
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_rejects_unknown_normalize_method() {
        let result = Cli::try_parse_from(["deepsat", "run", "--normalize-method", "zscore"]);
        assert!(result.is_err());
    }
}
