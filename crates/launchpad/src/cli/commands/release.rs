//! Release commands: version creation, build selection and review submission

use clap::{Args, Subcommand};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use launchpad_core::VersionDescriptor;

use crate::cli::{output, Cli, Services};

/// Version creation, build selection and review submission
#[derive(Debug, Args)]
pub struct ReleaseCommand {
    #[command(subcommand)]
    pub command: ReleaseSubcommand,
}

/// Release subcommands
#[derive(Debug, Subcommand)]
pub enum ReleaseSubcommand {
    /// Create a new version on the store
    CreateVersion(CreateVersionCommand),

    /// List builds uploaded for a version
    Builds(VersionArgs),

    /// Attach a processed build to a version
    SelectBuild(SelectBuildCommand),

    /// Submit a version for review
    Submit(SubmitCommand),
}

/// Tenant, app and optional version selection
#[derive(Debug, Args)]
pub struct VersionArgs {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,

    /// Local app id or remote app id
    #[arg(long)]
    pub app: String,

    /// Local version id (defaults to the app's current version)
    #[arg(long)]
    pub version_id: Option<Uuid>,
}

/// Create a version
#[derive(Debug, Args)]
pub struct CreateVersionCommand {
    /// Tenant id
    #[arg(long, env = "LAUNCHPAD_TENANT")]
    pub tenant: String,

    /// Local app id or remote app id
    #[arg(long)]
    pub app: String,

    /// Version string, e.g. 1.2.0
    pub version_string: String,
}

/// Select a build
#[derive(Debug, Args)]
pub struct SelectBuildCommand {
    #[command(flatten)]
    pub target: VersionArgs,

    /// Local or remote build id
    pub build: String,
}

/// Submit for review
#[derive(Debug, Args)]
pub struct SubmitCommand {
    #[command(flatten)]
    pub target: VersionArgs,

    /// Skip confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl ReleaseCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        match &self.command {
            ReleaseSubcommand::CreateVersion(cmd) => runtime.block_on(cmd.execute(cli)),
            ReleaseSubcommand::Builds(args) => runtime.block_on(builds(args, cli)),
            ReleaseSubcommand::SelectBuild(cmd) => runtime.block_on(cmd.execute(cli)),
            ReleaseSubcommand::Submit(cmd) => runtime.block_on(cmd.execute(cli)),
        }
    }
}

impl CreateVersionCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::load()?;
        let app_id = services.resolve_app(&self.tenant, &self.app).await?;
        let descriptor = services
            .coordinator()
            .create_version(&self.tenant, app_id, &self.version_string)
            .await?;

        if cli.is_json() {
            output::json(&descriptor)?;
        } else if !cli.quiet {
            output::success(&format!(
                "Created version {}",
                output::version_style().apply_to(&descriptor.version.version_string)
            ));
            print_descriptor(&descriptor);
        }
        Ok(())
    }
}

async fn builds(args: &VersionArgs, cli: &Cli) -> anyhow::Result<()> {
    let services = Services::load()?;
    let app_id = services.resolve_app(&args.tenant, &args.app).await?;
    let version_id = services.resolve_version(app_id, args.version_id).await?;
    let builds = services
        .coordinator()
        .list_builds_for_version(&args.tenant, app_id, version_id)
        .await?;

    if cli.is_json() {
        return output::json(&builds);
    }
    if cli.quiet {
        return Ok(());
    }
    if builds.is_empty() {
        output::info("No builds uploaded for this version");
        return Ok(());
    }
    println!("{}", output::header("Builds"));
    for build in &builds {
        println!("  {}", output::build_line(build));
    }
    Ok(())
}

impl SelectBuildCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::load()?;
        let app_id = services.resolve_app(&self.target.tenant, &self.target.app).await?;
        let version_id = services.resolve_version(app_id, self.target.version_id).await?;
        let descriptor = services
            .coordinator()
            .select_build(&self.target.tenant, app_id, version_id, &self.build)
            .await?;

        if cli.is_json() {
            output::json(&descriptor)?;
        } else if !cli.quiet {
            output::success("Build attached");
            print_descriptor(&descriptor);
        }
        Ok(())
    }
}

impl SubmitCommand {
    async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let services = Services::load()?;
        let app_id = services.resolve_app(&self.target.tenant, &self.target.app).await?;
        let version_id = services.resolve_version(app_id, self.target.version_id).await?;

        if !self.yes && !cli.is_json() && console::user_attended() {
            let confirmed = Confirm::new()
                .with_prompt("Submit this version for review?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        let outcome = services
            .coordinator()
            .submit_for_review(&self.target.tenant, app_id, version_id)
            .await?;

        if cli.is_json() {
            output::json(&outcome)?;
        } else if !cli.quiet {
            output::success(&format!(
                "Submitted for review ({})",
                output::id_style().apply_to(&outcome.submission_id)
            ));
            print_descriptor(&outcome.version);
        }
        Ok(())
    }
}

fn print_descriptor(descriptor: &VersionDescriptor) {
    let version = &descriptor.version;
    println!(
        "{}",
        output::key_value(
            "version",
            &output::version_style().apply_to(&version.version_string).to_string()
        )
    );
    println!(
        "{}",
        output::key_value(
            "state",
            &output::state_style(version.state).apply_to(version.state).to_string()
        )
    );
    println!("{}", output::key_value("id", &version.id.to_string()));
    match &descriptor.selected_build {
        Some(build) => println!("{}", output::key_value("build", &output::build_line(build))),
        None => println!("{}", output::key_value("build", "(none)")),
    }
}
