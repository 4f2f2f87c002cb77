//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod script;
mod submit;

pub use run::RunArgs;
pub use script::ScriptArgs;
pub use submit::SubmitArgs;

use anyhow::Result;
use clap::Subcommand;
use deepsat_runner::RunnerConfig;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Allocate resources, load modules and run the preprocessing program
    Run(RunArgs),
    /// Submit the job as a Slurm batch script
    Submit(SubmitArgs),
    /// Print the Slurm batch script for the job
    Script(ScriptArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The runner configuration
pub async fn handle_command(command: Commands, config: &RunnerConfig) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run(args, config).await,
        Commands::Submit(args) => submit::handle_submit(args, config).await,
        Commands::Script(args) => script::handle_script(args, config),
    }
}
