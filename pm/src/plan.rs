//! Install orchestration (spec.md §4.2 "Install").
//!
//! A `Plan` is the flattened set of dependency trees computed for the
//! project's direct requirements; `execute_plan` downloads, extracts,
//! installs lifecycle scripts (best-effort) and writes bin shims for it.
//! Concurrency is bounded exactly as spec.md §5 documents: registry/tarball
//! fetches in batches of at most `CLIENT_LIMIT` (6), resolution fan-out at
//! `RESOLVE_FANOUT` (8).

use std::sync::Arc;

use color_eyre::eyre::Result;
use compact_str::{CompactString, ToCompactString};
use owo_colors::OwoColorize;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sprout_vfs::Vfs;
use tokio::sync::Semaphore;

use crate::bins::write_bin_shims;
use crate::config::read_config;
use crate::extract::extract_tarball;
use crate::package::PackageMetadata;
use crate::progress::{log_progress, log_verbose, log_warning};
use crate::registry::{Registry, CLIENT_LIMIT};
use crate::resolver::{DependencyTree, Graph};

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Plan {
    #[serde(flatten)]
    pub trees: FxHashMap<CompactString, DependencyTree>,
}

impl Plan {
    pub fn new(trees: FxHashMap<CompactString, DependencyTree>) -> Self {
        Self { trees }
    }

    /// True if every root requirement in `package` is satisfied by a tree
    /// in this plan — used to short-circuit reinstalling an up-to-date
    /// `node_modules`.
    pub fn satisfies(&self, package: &PackageMetadata) -> bool {
        let map: FxHashMap<_, _> = self
            .trees
            .values()
            .map(|x| (x.root.name.clone(), x.root.version.clone()))
            .collect();
        package.iter_all().all(|req| {
            map.get(&req.name)
                .map(|version| req.version.satisfies(version))
                .unwrap_or(false)
        })
    }
}

pub fn tree_size(trees: &FxHashMap<CompactString, DependencyTree>) -> usize {
    trees.len() + trees.values().map(|x| tree_size(&x.children)).sum::<usize>()
}

fn flatten_trees<'a>(trees: &'a FxHashMap<CompactString, DependencyTree>, out: &mut Vec<&'a DependencyTree>) {
    for tree in trees.values() {
        out.push(tree);
        flatten_trees(&tree.children, out);
    }
}

/// Download, decompress and extract one resolved package directly into
/// `<root>/node_modules/<name>`. Re-extraction is skipped when the package's
/// `package.json.version` already matches (spec.md §3 invariant).
#[tracing::instrument(skip(vfs, registry, semaphore))]
async fn install_one(
    vfs: &Vfs,
    registry: &Registry,
    semaphore: &Semaphore,
    root: &str,
    tree: &DependencyTree,
) -> Result<()> {
    let dep = &tree.root;
    let target = format!("{root}/node_modules/{}", dep.name);
    let package_json_path = format!("{target}/package.json");

    if let Ok(bytes) = vfs.read(&package_json_path) {
        if let Ok(existing) = serde_json::from_slice::<serde_json::Value>(&bytes) {
            if existing.get("version").and_then(|v| v.as_str()) == Some(&dep.version.to_string()) {
                log_verbose(&format!("Skipping installation for {}", dep.id()));
                return Ok(());
            }
        }
    }

    let _permit = semaphore.acquire().await.unwrap();
    log_verbose(&format!("Downloading {}@{}", dep.name, dep.version));
    let gz = registry.fetch_tarball(&dep.dist.tarball).await?;
    drop(_permit);

    let _ = vfs.remove_dir(&target, true);
    extract_tarball(vfs, &gz, &target, 1, |_| true)?;

    log_progress(&format!("Installed {}", dep.id().to_string().bright_blue()));
    Ok(())
}

#[async_recursion::async_recursion]
async fn install_recursive(
    vfs: Vfs,
    registry: Arc<Registry>,
    semaphore: Arc<Semaphore>,
    root: String,
    tree: DependencyTree,
) -> Result<()> {
    install_one(&vfs, &registry, &semaphore, &root, &tree).await?;

    let child_root = format!("{root}/node_modules/{}", tree.root.name);
    let mut handles = Vec::new();
    for child in tree.children.into_values() {
        handles.push(tokio::spawn(install_recursive(
            vfs.clone(),
            registry.clone(),
            semaphore.clone(),
            child_root.clone(),
            child,
        )));
    }
    for handle in handles {
        handle.await??;
    }
    Ok(())
}

pub async fn execute_plan(vfs: &Vfs, root: &str, plan: Plan) -> Result<()> {
    let registry = Arc::new(Registry::default());
    let semaphore = Arc::new(Semaphore::new(CLIENT_LIMIT));
    let vfs = vfs.clone();

    let mut handles = Vec::new();
    for tree in plan.trees.into_values() {
        handles.push(tokio::spawn(install_recursive(
            vfs.clone(),
            registry.clone(),
            semaphore.clone(),
            root.to_string(),
            tree,
        )));
    }
    for handle in handles {
        handle.await??;
    }
    Ok(())
}

/// Run `preinstall`/`install`/`postinstall` for every package in the plan,
/// best-effort. Supplemented feature (spec.md doesn't mention install
/// scripts; see DESIGN.md): downgraded to "if the script is a bare `node
/// <file>` invocation, run it through the embedded runtime" since there is
/// no real process tree to exec a shell against. Anything else logs a skip
/// warning rather than failing the install.
pub async fn run_install_scripts(
    vfs: &Vfs,
    root: &str,
    plan: &Plan,
    run_node_script: impl Fn(&str, &str) -> Result<()>,
) -> Result<()> {
    if read_config().await?.disallow_install_scripts {
        return Ok(());
    }

    let mut all = Vec::new();
    flatten_trees(&plan.trees, &mut all);

    for tree in all {
        let dir = format!("{root}/node_modules/{}", tree.root.name);
        let package_json_path = format!("{dir}/package.json");
        let Ok(bytes) = vfs.read(&package_json_path) else { continue };
        let Ok(package): Result<PackageMetadata, _> = serde_json::from_slice(&bytes) else {
            continue;
        };

        for script_name in ["preinstall", "install", "postinstall"] {
            let Some(serde_json::Value::String(script)) = package.scripts.get(script_name) else {
                continue;
            };

            if let Some(file) = bare_node_invocation(script) {
                run_node_script(&format!("{dir}/{file}"), &dir)?;
            } else {
                log_warning(&format!(
                    "Package {} has a `{script_name}` script that is not a bare `node <file>` invocation; skipping",
                    tree.root.id()
                ));
            }
        }
    }

    Ok(())
}

/// Recognize a script body of the shape `node <file>` (optionally with a
/// leading `./`), the only lifecycle-script form this sandbox can execute
/// without a real shell.
fn bare_node_invocation(script: &str) -> Option<&str> {
    let rest = script.trim().strip_prefix("node ")?;
    let file = rest.trim();
    if file.is_empty() || file.contains(['&', '|', ';', '>', '<']) {
        None
    } else {
        Some(file)
    }
}

pub async fn setup_bins(vfs: &Vfs, root: &str, plan: &Plan) -> Result<()> {
    let mut all = Vec::new();
    flatten_trees(&plan.trees, &mut all);
    let trees: Vec<DependencyTree> = all.into_iter().cloned().collect();
    write_bin_shims(vfs, root, &trees)?;
    Ok(())
}

/// Build the flat `Graph`, then the install trees, for `package`'s direct
/// dependency closure.
pub async fn prepare_plan(graph: &mut Graph, package: &PackageMetadata, immutable: bool) -> Result<Plan> {
    log_progress("Preparing");

    if !immutable {
        graph.append(package.iter_all(), false).await?;
    }

    log_progress("Retrieved dependency graph");

    let roots: Vec<_> = package.iter_all().collect();
    let trees = graph.build_trees(&roots)?;

    let plan = Plan::new(
        trees
            .into_iter()
            .map(|tree| (tree.root.name.to_compact_string(), tree))
            .collect(),
    );

    log_progress(&format!("Planned {} dependencies", plan.trees.len()));

    Ok(plan)
}
