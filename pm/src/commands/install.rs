//! Install command implementation (spec.md §4.2 "Install").

use color_eyre::eyre::Result;
use owo_colors::OwoColorize;
use std::time::Instant;

use crate::config::read_config;
use crate::lockfile::Lockfile;
use crate::package::read_package;
use crate::plan::{execute_plan, prepare_plan, run_install_scripts, setup_bins, tree_size, Plan};
use crate::progress::{finish_progress, log_verbose, set_total, PROGRESS_BAR};
use crate::resolver::Graph;
use crate::Args;
use sprout_vfs::Vfs;

fn cwd(args: &Args) -> String {
    args.working_dir
        .as_ref()
        .and_then(|p| p.to_str())
        .unwrap_or("/")
        .to_string()
}

/// Execute the install command.
pub async fn cmd_install(vfs: &Vfs, cwd_arg: &str, args: &Args) -> Result<()> {
    install(vfs, cwd_arg, args).await
}

fn plan_path(root: &str) -> String {
    format!("{root}/node_modules/.sprout/plan.json")
}

fn lockfile_path(root: &str) -> String {
    format!("{root}/node_modules/.package-lock.json")
}

fn read_plan(vfs: &Vfs, root: &str) -> Option<Plan> {
    let bytes = vfs.read(&plan_path(root)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Verify that the current installation matches the plan.
pub fn verify_installation(vfs: &Vfs, root: &str, plan: &Plan) -> bool {
    matches!(read_plan(vfs, root), Some(installed) if &installed == plan)
}

/// Install packages based on `package.json`.
pub async fn install(vfs: &Vfs, cwd_arg: &str, args: &Args) -> Result<()> {
    let root = if !cwd_arg.is_empty() { cwd_arg.to_string() } else { cwd(args) };
    let package = read_package(vfs, &root).await?;

    init_storage(vfs, &root)?;
    let config = read_config().await?;

    let start = Instant::now();

    let mut graph = load_graph_from_lockfile(vfs, &root);
    let plan = prepare_plan(&mut graph, &package, args.immutable).await?;
    let size = tree_size(&plan.trees);
    set_total(size as u64 * 2); // download + install

    if verify_installation(vfs, &root, &plan) {
        log_verbose("Packages already installed");
    } else {
        execute_plan(vfs, &root, plan.clone()).await?;

        finish_progress();
        PROGRESS_BAR.suspend(|| {
            if size > 0 {
                println!(
                    "Installed {} packages in {}ms",
                    size.to_string().yellow(),
                    start.elapsed().as_millis().to_string().yellow()
                )
            }
        });

        if !config.disallow_install_scripts {
            run_install_scripts(vfs, &root, &plan, |_file, _dir| {
                tracing::debug!("lifecycle script execution deferred to the embedded runtime");
                Ok(())
            })
            .await?;
        }

        setup_bins(vfs, &root, &plan).await?;

        if !args.immutable {
            write_lockfile(vfs, &root, graph)?;
        }

        let plan_bytes = serde_json::to_vec(&plan)?;
        vfs.write(&plan_path(&root), &plan_bytes)
            .map_err(|e| color_eyre::eyre::eyre!("{e}"))?;
    }

    PROGRESS_BAR.finish_and_clear();

    Ok(())
}

fn write_lockfile(vfs: &Vfs, root: &str, graph: Graph) -> Result<()> {
    let lockfile = Lockfile::new(graph);
    let bytes = serde_json::to_vec_pretty(&lockfile)?;
    vfs.write(&lockfile_path(root), &bytes)
        .map_err(|e| color_eyre::eyre::eyre!("{e}"))?;
    Ok(())
}

/// Reconstruct a resolver [`Graph`] from `<root>/node_modules/.package-lock.json` if present,
/// otherwise start from an empty graph. `Graph::append` fills in anything
/// new without re-fetching already-locked entries' manifests.
pub fn load_graph_from_lockfile(vfs: &Vfs, root: &str) -> Graph {
    let mut graph = Graph::default();
    let Ok(bytes) = vfs.read(&lockfile_path(root)) else {
        return graph;
    };
    let Ok(lockfile) = serde_json::from_slice::<Lockfile>(&bytes) else {
        return graph;
    };

    for (name, entry) in lockfile.entries {
        graph.resolved.insert(
            name.clone(),
            crate::resolver::Dependency {
                name,
                version: entry.version,
                dist: crate::package::Dist {
                    tarball: entry.resolved,
                    shasum: entry.shasum,
                },
                dependencies: Default::default(),
                bin: Default::default(),
            },
        );
    }

    graph
}

/// Initialize `node_modules/.sprout` and `.bin` directories in the VFS.
pub fn init_storage(vfs: &Vfs, root: &str) -> Result<()> {
    vfs.mkdir(&format!("{root}/node_modules/.sprout"), true)
        .map_err(|e| color_eyre::eyre::eyre!("{e}"))?;
    vfs.mkdir(&format!("{root}/node_modules/.bin"), true)
        .map_err(|e| color_eyre::eyre::eyre!("{e}"))?;
    Ok(())
}
