//! Why command implementation.

use color_eyre::eyre::{eyre, Result};
use compact_str::CompactString;
use multimap::MultiMap;
use node_semver::Version;
use owo_colors::OwoColorize;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use sprout_vfs::Vfs;

use crate::commands::install::load_graph_from_lockfile;
use crate::package::{read_package, PackageSpecifier};
use crate::resolver::Graph;

/// Execute the why command: explain which root requirement(s) pull in
/// `name`(`@version`), walking "required by" edges back to `package.json`.
pub async fn cmd_why(vfs: &Vfs, cwd: &str, name: &CompactString, version: Option<&Version>) -> Result<()> {
    let package = read_package(vfs, cwd).await?;

    let graph = load_graph_from_lockfile(vfs, cwd);

    let map = build_map(&graph)?;

    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::new();

    if let Some(version) = version {
        queue.push_back((name.clone(), version.clone()));
    } else if let Some(dep) = graph.resolved.get(name) {
        queue.push_back((name.clone(), dep.version.clone()));
    }

    if queue.is_empty() {
        return Err(eyre!("Package {} is not used", name));
    }

    while let Some((name, version)) = queue.pop_front() {
        if seen.insert((name.clone(), version.clone())) {
            if let Some(required_by) = map.get_vec(&(name.clone(), version.clone())) {
                if !required_by.is_empty() {
                    println!("{}", format!("{}@{} is used by:", name.yellow(), version).bold());
                    for parent in required_by {
                        let parent_dep = graph.resolve_req(parent)?;
                        queue.push_back((parent_dep.name.clone(), parent_dep.version.clone()));
                        println!(" - {}@{}", parent_dep.name, parent_dep.version);
                    }
                    println!();
                }
            } else if package.iter_all().any(|x| x.name == name && x.version.satisfies(&version)) {
                println!(
                    "{}",
                    format!("{}@{} is used by package.json", name.yellow(), version).bold()
                );
                println!();
            } else {
                return Err(eyre!("Package {}@{} is not used", name, version));
            }
        }
    }

    println!("Analyzed {} packages", seen.len().to_string().yellow());

    Ok(())
}

/// `(child name, child version) -> requesting specifiers` reverse index
/// over the whole graph's relations.
fn build_map(graph: &Graph) -> Result<MultiMap<(CompactString, Version), PackageSpecifier>> {
    let mut map = MultiMap::new();

    for (from, to) in graph.relations.iter() {
        for child_req in to.iter() {
            let child_dep = graph.resolve_req(&child_req)?;
            map.insert((child_dep.name.clone(), child_dep.version.clone()), from.clone());
        }
    }

    Ok(map)
}
