//! CLI commands

mod apps;
mod init;
mod release;
mod sync;
mod tenant;

pub use apps::AppsCommand;
pub use init::InitCommand;
pub use release::ReleaseCommand;
pub use sync::SyncCommand;
pub use tenant::TenantCommand;
