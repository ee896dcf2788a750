//! Command implementations for the installer CLI.

mod add;
mod clean;
mod install;
mod remove;
mod update;
mod upgrade;
mod why;

pub use add::cmd_add;
pub use clean::cmd_clean;
pub use install::{cmd_install, init_storage, install};
pub use remove::cmd_remove;
pub use update::cmd_update;
pub use upgrade::cmd_upgrade;
pub use why::cmd_why;

use crate::cli::Subcommand;
use crate::Args;
use color_eyre::eyre::Result;
use sprout_vfs::Vfs;

/// Execute the appropriate command based on CLI arguments.
pub async fn execute_command(vfs: &Vfs, cwd: &str, args: &Args) -> Result<()> {
    match &args.cmd {
        Subcommand::Install => cmd_install(vfs, cwd, args).await,
        Subcommand::Update => cmd_update(vfs, cwd, args).await,
        Subcommand::Add { names, dev, pin } => cmd_add(vfs, cwd, names, *dev, *pin).await,
        Subcommand::Clean => cmd_clean(vfs, cwd),
        Subcommand::Upgrade { pin } => cmd_upgrade(vfs, cwd, *pin).await,
        Subcommand::Remove { names, dev } => cmd_remove(vfs, cwd, names, *dev).await,
        Subcommand::Why { name, version } => cmd_why(vfs, cwd, name, version.as_ref()).await,
    }
}
