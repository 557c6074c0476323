//! Tenant credential commands

use std::path::Path;

use clap::{Args, Subcommand};
use console::style;
use tracing::info;
use uuid::Uuid;

use launchpad_core::{configure_store_connection, LaunchpadError, StoreConnection};

use crate::cli::{output, Cli, Services};

/// Tenant store credentials
#[derive(Debug, Args)]
pub struct TenantCommand {
    #[command(subcommand)]
    pub command: TenantSubcommand,
}

/// Tenant subcommands
#[derive(Debug, Subcommand)]
pub enum TenantSubcommand {
    /// Set or rotate a tenant's App Store Connect API key
    Configure(ConfigureCommand),
}

/// Set or rotate a tenant's API key
#[derive(Debug, Args)]
pub struct ConfigureCommand {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,

    /// API Key Issuer ID
    #[arg(long, env = "APP_STORE_CONNECT_ISSUER_ID")]
    pub issuer_id: Uuid,

    /// App Store Connect API Key ID
    #[arg(long, env = "APP_STORE_CONNECT_KEY_ID")]
    pub key_id: String,

    /// Path to .p8 key file or key contents
    #[arg(long, env = "APP_STORE_CONNECT_KEY", hide_env_values = true)]
    pub private_key: String,
}

impl TenantCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match &self.command {
            TenantSubcommand::Configure(cmd) => runtime.block_on(cmd.execute(cli)),
        }
    }
}

impl ConfigureCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(tenant = %self.tenant, key_id = %self.key_id, "configuring tenant");
        let services = Services::load()?;

        let connection = StoreConnection {
            issuer_id: self.issuer_id,
            key_id: self.key_id.clone(),
            private_key: read_private_key(&self.private_key)?,
        };
        let record = configure_store_connection(
            services.store.as_ref(),
            &services.tokens,
            &self.tenant,
            connection,
        )
        .await?;

        if cli.is_json() {
            output::json(&serde_json::json!({
                "tenant": record.id,
                "issuer_id": record.issuer_id,
                "key_id": record.key_id,
                "updated_at": record.updated_at,
            }))?;
        } else if !cli.quiet {
            output::success(&format!(
                "Stored API key {} for tenant {}",
                style(self.key_id.trim()).cyan(),
                style(&record.id).bold()
            ));
            println!(
                "{}",
                output::key_value("state file", &services.storage_path.display().to_string())
            );
        }

        Ok(())
    }
}

/// Key contents, read from disk when `value` names a file
fn read_private_key(value: &str) -> anyhow::Result<String> {
    if value.contains("-----BEGIN") {
        return Ok(value.to_string());
    }

    let path = Path::new(value);
    if !path.is_file() {
        return Err(LaunchpadError::Validation(format!(
            "private key must be PEM contents or a path to a .p8 file, got '{}'",
            value
        ))
        .into());
    }
    Ok(std::fs::read_to_string(path)?)
}
