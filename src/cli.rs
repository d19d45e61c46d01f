// src/cli.rs
//! CLI definitions for rhel2centos
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use rhel2centos::MigrationConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rhel2centos")]
#[command(author = "rhel2centos Contributors")]
#[command(version)]
#[command(about = "Convert a RHEL 7 host to CentOS 7 in place", long_about = None)]
pub struct Cli {
    /// Configuration file (default: /etc/rhel2centos.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Filesystem root for host checks; `run` only accepts /
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Stage status document
    #[arg(long, global = true)]
    pub status_file: Option<PathBuf>,

    /// Persistent log file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the migration, resuming after completed stages (default)
    Run,

    /// Show which stages have completed
    Status,

    /// Clear stages from the status document so they run again
    Reset {
        /// Stage keys to clear (see `status`)
        #[arg(required = true)]
        stages: Vec<String>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut MigrationConfig) {
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(status_file) = &self.status_file {
            config.status_file = status_file.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["rhel2centos"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "rhel2centos",
            "status",
            "--status-file",
            "/tmp/s.json",
            "--root",
            "/mnt",
        ]);
        let mut config = MigrationConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.status_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.root, PathBuf::from("/mnt"));
        assert_eq!(config.log_file, PathBuf::from("/var/log/rhel2centos.log"));
    }

    #[test]
    fn test_reset_requires_stage() {
        assert!(Cli::try_parse_from(["rhel2centos", "reset"]).is_err());
        let cli = Cli::try_parse_from(["rhel2centos", "reset", "recreate_grub_config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Reset { stages }) if stages.len() == 1));
    }
}
