//! Package installer: registry client, semver resolver, tarball extractor,
//! and the `install`/`add`/`remove`/`update`/`upgrade`/`why`/`clean` CLI
//! commands built on top of them (spec.md §4.2).
//!
//! Everything here operates against an in-memory [`sprout_vfs::Vfs`]
//! instead of the host filesystem — there is no real disk backing a page
//! session, so "installing a package" means extracting its tarball into the
//! virtual tree, not writing to `/home/user/project/node_modules`.

pub mod bins;
pub mod cli;
pub mod commands;
pub mod config;
pub mod extract;
pub mod lockfile;
pub mod package;
pub mod plan;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod semver;

pub use cli::{Args, Subcommand};
pub use commands::execute_command;
pub use progress::PROGRESS_BAR;

use color_eyre::eyre::Result;
use sprout_vfs::Vfs;

/// Run the CLI entry point against a given VFS, rooted at `cwd` (an
/// absolute VFS path, typically `/`).
pub async fn package_manager(vfs: &Vfs, cwd: &str, args: &Args) -> Result<()> {
    execute_command(vfs, cwd, args).await?;
    PROGRESS_BAR.finish_and_clear();
    Ok(())
}
