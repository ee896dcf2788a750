//! Upgrade command implementation.

use color_eyre::eyre::Result;
use itertools::Itertools;
use sprout_vfs::Vfs;

use crate::commands::add::add_packages;
use crate::package::read_package;

/// Execute the upgrade command: re-resolve every already-declared
/// dependency against the registry's `latest` dist-tag.
pub async fn cmd_upgrade(vfs: &Vfs, cwd: &str, pin: bool) -> Result<()> {
    let package = read_package(vfs, cwd).await?;
    add_packages(vfs, cwd, &package.dependencies.keys().cloned().collect_vec(), false, pin).await?;
    add_packages(
        vfs,
        cwd,
        &package.dev_dependencies.keys().cloned().collect_vec(),
        true,
        pin,
    )
    .await?;
    Ok(())
}
