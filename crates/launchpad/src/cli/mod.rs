//! CLI definition and command handling

pub mod commands;
pub mod output;
mod services;

use clap::{Parser, Subcommand};

use commands::{AppsCommand, InitCommand, ReleaseCommand, SyncCommand, TenantCommand};

pub use services::Services;

/// Launchpad - store listing sync and release submission
#[derive(Debug, Parser)]
#[command(name = "launchpad")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a default launchpad.toml
    Init(InitCommand),

    /// Tenant store credentials
    Tenant(TenantCommand),

    /// Remote and local apps
    Apps(AppsCommand),

    /// Listing synchronization
    Sync(SyncCommand),

    /// Version creation, build selection and review submission
    Release(ReleaseCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Tenant(ref cmd) => cmd.execute(&self),
            Commands::Apps(ref cmd) => cmd.execute(&self),
            Commands::Sync(ref cmd) => cmd.execute(&self),
            Commands::Release(ref cmd) => cmd.execute(&self),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
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
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "launchpad",
            "--format",
            "json",
            "-C",
            "/tmp",
            "apps",
            "local",
            "--tenant",
            "acme",
        ])
        .unwrap();
        assert!(cli.is_json());
        assert_eq!(cli.directory, Some(std::path::PathBuf::from("/tmp")));
    }
}
