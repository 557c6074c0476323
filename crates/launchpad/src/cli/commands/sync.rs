//! Listing sync commands

use clap::{Args, Subcommand};
use console::style;

use crate::cli::{output, Cli, Services};

/// Listing synchronization
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    pub command: SyncSubcommand,
}

/// Sync subcommands
#[derive(Debug, Subcommand)]
pub enum SyncSubcommand {
    /// Compare the local listing with the remote without writing anything
    Status(AppArgs),

    /// Pull the remote listing into local state
    Pull(AppArgs),
}

/// Tenant and app selection
#[derive(Debug, Args)]
pub struct AppArgs {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,

    /// Local app id or remote app id
    #[arg(long)]
    pub app: String,
}

impl SyncCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match &self.command {
            SyncSubcommand::Status(args) => runtime.block_on(status(args, cli)),
            SyncSubcommand::Pull(args) => runtime.block_on(pull(args, cli)),
        }
    }
}

async fn status(args: &AppArgs, cli: &Cli) -> anyhow::Result<()> {
    let services = Services::load()?;
    let app_id = services.resolve_app(&args.tenant, &args.app).await?;
    let report = services.reconciler.check_staleness(&args.tenant, app_id).await?;

    if cli.is_json() {
        output::json(&report)?;
    } else if !cli.quiet {
        if report.up_to_date {
            output::success("Local listing is up to date");
        } else if report.local_fingerprint.is_none() {
            output::warning("App has never been pulled");
        } else {
            output::warning("Remote listing has changed since the last pull");
        }
        println!(
            "{}",
            output::key_value(
                "local",
                report.local_fingerprint.as_deref().unwrap_or("(none)")
            )
        );
        println!("{}", output::key_value("remote", &report.remote_fingerprint));
    }
    Ok(())
}

async fn pull(args: &AppArgs, cli: &Cli) -> anyhow::Result<()> {
    let services = Services::load()?;
    let app_id = services.resolve_app(&args.tenant, &args.app).await?;
    let result = services.reconciler.reconcile(&args.tenant, app_id).await?;

    if cli.is_json() {
        return output::json(&result);
    }
    if cli.quiet {
        return Ok(());
    }

    if result.changed {
        output::success("Local listing updated");
    } else {
        output::info("Nothing changed");
    }
    match &result.version {
        Some(version) => {
            println!(
                "{}",
                output::key_value(
                    "version",
                    &output::version_style()
                        .apply_to(&version.version_string)
                        .to_string()
                )
            );
            println!(
                "{}",
                output::key_value(
                    "state",
                    &output::state_style(version.state).apply_to(version.state).to_string()
                )
            );
            let locales: Vec<&str> = result.localizations.iter().map(|l| l.locale.as_str()).collect();
            println!("{}", output::key_value("locales", &locales.join(", ")));
        }
        None => println!("  {}", style("no version on the store yet").dim()),
    }
    Ok(())
}
