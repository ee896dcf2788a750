//! Clean command implementation.

use color_eyre::eyre::Result;
use sprout_vfs::Vfs;

/// Execute the clean command: remove `node_modules` and the lockfile cache
/// directory from the VFS.
pub fn cmd_clean(vfs: &Vfs, cwd: &str) -> Result<()> {
    for dir in ["node_modules"] {
        match vfs.remove_dir(&format!("{cwd}/{dir}"), true) {
            Ok(()) => {}
            Err(e) if matches!(e, sprout_vfs::VsysError::NotFound(_)) => {}
            Err(e) => return Err(color_eyre::eyre::eyre!("{e}")),
        }
    }
    Ok(())
}
