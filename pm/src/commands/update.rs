//! Update command implementation.

use color_eyre::eyre::{eyre, Result};
use color_eyre::Help;
use owo_colors::OwoColorize;
use std::time::Instant;
use sprout_vfs::Vfs;

use crate::commands::init_storage;
use crate::lockfile::Lockfile;
use crate::package::read_package;
use crate::progress::PROGRESS_BAR;
use crate::resolver::Graph;
use crate::Args;

fn lockfile_path(root: &str) -> String {
    format!("{root}/node_modules/.package-lock.json")
}

/// Execute the update command: re-resolve everything from scratch and
/// overwrite the lockfile.
pub async fn cmd_update(vfs: &Vfs, cwd: &str, args: &Args) -> Result<()> {
    if args.immutable {
        return Err(eyre!("Cannot update lockfile").suggestion("Remove the --immutable flag"));
    }

    let package = read_package(vfs, cwd).await?;

    init_storage(vfs, cwd)?;

    let start = Instant::now();

    let mut graph = Graph::default();
    graph.append(package.iter_all(), false).await?;

    let bytes = serde_json::to_vec_pretty(&Lockfile::new(graph.clone()))?;
    vfs.write(&lockfile_path(cwd), &bytes)
        .map_err(|e| color_eyre::eyre::eyre!("{e}"))?;

    PROGRESS_BAR.suspend(|| {
        println!(
            "Prepared {} packages in {}ms",
            graph.relations.len().to_string().yellow(),
            start.elapsed().as_millis().to_string().yellow()
        )
    });

    Ok(())
}
