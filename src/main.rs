// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use rhel2centos::{logging, MigrationConfig, RunOutcome};
use std::process::ExitCode;
use tracing::{error, info};

/// Exit status for a hard failure; rerun after fixing the cause
const FAILURE_EXIT_CODE: u8 = 1;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match MigrationConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init(None, cli.verbose);
            error!("{}", e);
            return ExitCode::from(FAILURE_EXIT_CODE);
        }
    };
    cli.apply_overrides(&mut config);

    let command = cli.command.unwrap_or(Commands::Run);
    // Only a migration run writes to the persistent log
    let log_file = matches!(command, Commands::Run).then_some(config.log_file.as_path());
    logging::init(log_file, cli.verbose);

    match dispatch(command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

fn dispatch(command: Commands, config: &MigrationConfig) -> Result<()> {
    match command {
        Commands::Run => {
            match commands::cmd_run(config)? {
                RunOutcome::Completed | RunOutcome::AlreadyMigrated => {}
                RunOutcome::InsufficientPrivilege => info!("Nothing done: insufficient privilege"),
                RunOutcome::UnsupportedOs { found } => {
                    info!("Nothing done: unsupported OS ({})", found)
                }
            }
            Ok(())
        }
        Commands::Status => commands::cmd_status(config),
        Commands::Reset { stages } => commands::cmd_reset(config, &stages),
    }
}
