//! App listing and import commands

use std::time::Duration;

use clap::{Args, Subcommand};
use console::style;
use dialoguer::MultiSelect;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use launchpad_core::workflow::needs_tenant_action;
use launchpad_core::{ImportReport, LaunchpadError, ListingStore};

use crate::cli::{output, Cli, Services};
use crate::exit_codes;

/// Remote and local apps
#[derive(Debug, Args)]
pub struct AppsCommand {
    #[command(subcommand)]
    pub command: AppsSubcommand,
}

/// Apps subcommands
#[derive(Debug, Subcommand)]
pub enum AppsSubcommand {
    /// List apps visible to the tenant's API key
    List(ListCommand),

    /// Import remote apps and pull their listings
    Import(ImportCommand),

    /// List apps already imported
    Local(LocalCommand),
}

/// List remote apps
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,
}

/// Import remote apps
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,

    /// Remote app ids to import (prompts when omitted)
    pub remote_ids: Vec<String>,

    /// Import every remote app without prompting
    #[arg(long, conflicts_with = "remote_ids")]
    pub all: bool,
}

/// List imported apps
#[derive(Debug, Args)]
pub struct LocalCommand {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,
}

impl AppsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match &self.command {
            AppsSubcommand::List(cmd) => runtime.block_on(cmd.execute(cli)),
            AppsSubcommand::Import(cmd) => runtime.block_on(cmd.execute(cli)),
            AppsSubcommand::Local(cmd) => runtime.block_on(cmd.execute(cli)),
        }
    }
}

impl ListCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::load()?;
        let apps = services.importer().list_remote_apps(&self.tenant).await?;

        if cli.is_json() {
            return output::json(&apps);
        }
        if cli.quiet {
            return Ok(());
        }
        if apps.is_empty() {
            output::info("No apps visible to this API key");
            return Ok(());
        }

        println!("{}", output::header(&format!("Remote apps for {}", self.tenant)));
        println!();
        for app in &apps {
            println!(
                "  {} {} {}",
                output::id_style().apply_to(&app.remote_id),
                style(&app.name).bold(),
                style(format!("({}, {})", app.bundle_id, app.platform)).dim()
            );
        }
        Ok(())
    }
}

impl ImportCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::load()?;
        let importer = services.importer();

        let remote_ids = if !self.remote_ids.is_empty() {
            self.remote_ids.clone()
        } else {
            let apps = importer.list_remote_apps(&self.tenant).await?;
            if self.all {
                apps.into_iter().map(|a| a.remote_id).collect()
            } else {
                if cli.is_json() || !console::user_attended() {
                    return Err(LaunchpadError::Validation(
                        "no app ids given; pass REMOTE_IDS or --all".to_string(),
                    )
                    .into());
                }
                let labels: Vec<String> = apps
                    .iter()
                    .map(|a| format!("{} ({})", a.name, a.remote_id))
                    .collect();
                let picked = MultiSelect::new()
                    .with_prompt("Apps to import")
                    .items(&labels)
                    .interact()?;
                picked.into_iter().map(|i| apps[i].remote_id.clone()).collect()
            }
        };

        if remote_ids.is_empty() {
            if !cli.quiet && !cli.is_json() {
                output::info("Nothing to import");
            }
            return Ok(());
        }

        info!(tenant = %self.tenant, count = remote_ids.len(), "importing apps");
        let spinner = if cli.quiet || cli.is_json() {
            ProgressBar::hidden()
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner:.blue} {msg}")?);
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        };
        spinner.set_message(format!("Importing {} app(s)...", remote_ids.len()));

        let report = importer.import_selected(&self.tenant, &remote_ids).await;
        spinner.finish_and_clear();
        let report = report?;

        if cli.is_json() {
            output::json(&report)?;
        } else if !cli.quiet {
            print_report(&report);
        }

        if !report.all_ok() {
            std::process::exit(exit_codes::PARTIAL_FAILURE);
        }
        Ok(())
    }
}

fn print_report(report: &ImportReport) {
    for outcome in &report.results {
        match &outcome.error {
            None if outcome.already_imported => output::info(&format!(
                "{} already imported",
                output::id_style().apply_to(&outcome.remote_app_id)
            )),
            None => output::success(&format!(
                "{} imported",
                output::id_style().apply_to(&outcome.remote_app_id)
            )),
            Some(error) => {
                output::error(&format!(
                    "{} failed ({}): {}",
                    output::id_style().apply_to(&outcome.remote_app_id),
                    error.kind,
                    error.message
                ));
                if needs_tenant_action(error.kind) {
                    output::warning("Sign in to App Store Connect and review the API key and agreements");
                }
            }
        }
    }
    println!();
    println!(
        "{} imported, {} failed",
        style(report.imported().len()).green().bold(),
        style(report.failed().len()).red().bold()
    );
}

impl LocalCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::load()?;
        let apps = services
            .store
            .apps(&self.tenant)
            .await
            .map_err(LaunchpadError::from)?;

        let mut rows = Vec::with_capacity(apps.len());
        for app in apps {
            let version = services
                .store
                .latest_version(app.id)
                .await
                .map_err(LaunchpadError::from)?;
            rows.push((app, version));
        }

        if cli.is_json() {
            let json: Vec<_> = rows
                .iter()
                .map(|(app, version)| serde_json::json!({ "app": app, "version": version }))
                .collect();
            return output::json(&json);
        }
        if cli.quiet {
            return Ok(());
        }
        if rows.is_empty() {
            output::info("No apps imported yet");
            return Ok(());
        }

        println!("{}", output::header(&format!("Imported apps for {}", self.tenant)));
        println!();
        for (app, version) in &rows {
            println!(
                "  {} {} {}",
                style(&app.title).bold(),
                output::id_style().apply_to(&app.remote_id),
                style(app.id).dim()
            );
            match version {
                Some(v) => println!(
                    "    {} {}",
                    output::version_style().apply_to(&v.version_string),
                    output::state_style(v.state).apply_to(v.state)
                ),
                None => println!("    {}", style("no version pulled").dim()),
            }
        }
        Ok(())
    }
}
