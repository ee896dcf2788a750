//! Flat dependency resolver (spec.md §4.2).
//!
//! DFS guarded by two sets — an in-progress set keyed by `name@range` (cycle
//! breaker) and the output map (flat dedupe): "When a name is already
//! resolved, the existing version wins; the new range is *not* re-checked."
//! Children are resolved in bounded-concurrency batches (spec.md §5: fan-out
//! capped at 8).

use std::collections::VecDeque;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use compact_str::{CompactString, ToCompactString};
use futures::future::try_join_all;
use node_semver::Version;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};

use crate::package::{BinField, Dist, PackageSpecifier, VersionSpecifier};
use crate::registry::Registry;

/// Bounded-concurrency fan-out for dependency resolution (spec.md §5).
pub const RESOLVE_FANOUT: usize = 8;

/// A single resolved package (spec.md §3: `{ name, version, tarballUrl,
/// dependencies }`), enriched with enough of the manifest to drive
/// extraction and bin-shim generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: CompactString,
    pub version: Version,
    pub dist: Dist,
    #[serde(default)]
    pub dependencies: indexmap::IndexMap<CompactString, CompactString>,
    #[serde(default)]
    pub bin: BinField,
}

impl Dependency {
    pub fn id(&self) -> CompactString {
        format!("{}@{}", self.name, self.version).to_compact_string()
    }

    /// This package's own dependency specifiers (used to walk further down
    /// the graph, and by `why` to compute "required by" edges).
    pub fn iter(&self) -> impl Iterator<Item = PackageSpecifier> + '_ {
        self.dependencies.iter().map(|(name, range)| PackageSpecifier {
            name: name.clone(),
            version: VersionSpecifier::parse(range),
        })
    }
}

/// An installable tree: a resolved root package plus, recursively, the
/// resolved children it depends on. Used only to decide install order and
/// to run lifecycle scripts innermost-out — the resolver's real contract
/// surface is the flat `Graph::resolved` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyTree {
    pub root: Dependency,
    pub children: FxHashMap<CompactString, DependencyTree>,
}

/// The resolver's output: a flat `name -> resolved package` map plus a
/// per-request memo (`name@range -> resolved package`) used by `why` to
/// explain which concrete version satisfied a given requirement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Flat node_modules policy: one globally-chosen version per name.
    pub resolved: FxHashMap<CompactString, Dependency>,
    /// Every distinct `(name, range)` request seen, mapped to the package
    /// that request resolved to (which may differ in version from what a
    /// *different* range for the same name resolved to, before flattening).
    pub relations: FxHashMap<PackageSpecifier, Dependency>,
}

impl Graph {
    /// Resolve `reqs` (and their transitive closure) into `self`. Safe to
    /// call repeatedly to extend an existing graph (e.g. lockfile + new
    /// `add`ed package).
    pub async fn append(
        &mut self,
        reqs: impl Iterator<Item = PackageSpecifier>,
        include_optional: bool,
    ) -> Result<()> {
        let registry = Arc::new(Registry::default());
        let semaphore = Arc::new(Semaphore::new(RESOLVE_FANOUT));
        let in_progress: Arc<Mutex<FxHashSet<PackageSpecifier>>> =
            Arc::new(Mutex::new(FxHashSet::default()));

        let mut queue: VecDeque<PackageSpecifier> = reqs.collect();
        let mut resolved = std::mem::take(&mut self.resolved);
        let mut relations = std::mem::take(&mut self.relations);

        while !queue.is_empty() {
            let batch: Vec<_> = queue.drain(..).collect();
            let mut next_batch = Vec::new();

            // A diamond dependency (two packages in the same batch both
            // requiring `c@^1.0.0`) enqueues the same request twice; dedupe
            // before resolving so the second copy doesn't look like a cycle
            // through `in_progress`. Real cycles are still caught below: a
            // request that's already `in_progress` from an *earlier* batch
            // (i.e. still unresolved higher up the same chain) is a genuine
            // cycle, not a duplicate sibling request.
            let mut seen_in_batch = FxHashSet::default();
            let unique_reqs: Vec<PackageSpecifier> =
                batch.iter().filter(|req| seen_in_batch.insert((*req).clone())).cloned().collect();

            let results = try_join_all(unique_reqs.into_iter().map(|req| {
                let registry = registry.clone();
                let semaphore = semaphore.clone();
                let in_progress = in_progress.clone();
                let already = resolved.get(&req.name).cloned();
                async move {
                    if let Some(existing) = already {
                        // Flat node_modules: existing version wins, new
                        // range not re-checked.
                        return Ok::<_, color_eyre::Report>((req, existing, Vec::new()));
                    }

                    {
                        let mut guard = in_progress.lock().await;
                        if !guard.insert(req.clone()) {
                            return Err(eyre!("dependency cycle detected at {req}"));
                        }
                    }

                    let _permit = semaphore.acquire().await.unwrap();
                    let resolved_dep = resolve_one(&registry, &req, include_optional).await?;
                    let children: Vec<_> = resolved_dep.iter().collect();

                    Ok((req, resolved_dep, children))
                }
            }))
            .await?;

            let mut by_req: FxHashMap<PackageSpecifier, (Dependency, Vec<PackageSpecifier>)> = FxHashMap::default();
            for (req, dep, children) in results {
                next_batch.extend(children.iter().cloned());
                by_req.insert(req, (dep, children));
            }

            for req in batch {
                if let Some((dep, _)) = by_req.get(&req) {
                    resolved.entry(dep.name.clone()).or_insert_with(|| dep.clone());
                    relations.insert(req, dep.clone());
                }
            }

            queue.extend(next_batch);
        }

        self.resolved = resolved;
        self.relations = relations;
        Ok(())
    }

    /// Look up the package a given requirement resolved to.
    pub fn resolve_req(&self, req: &PackageSpecifier) -> Result<&Dependency> {
        self.relations
            .get(req)
            .or_else(|| self.resolved.get(&req.name))
            .ok_or_else(|| eyre!("`{req}` was never resolved"))
    }

    /// Build installable trees for the given root requirements, by walking
    /// the flat `resolved` map from each root downward.
    pub fn build_trees(&self, roots: &[PackageSpecifier]) -> Result<Vec<DependencyTree>> {
        roots.iter().map(|root| self.build_tree(root)).collect()
    }

    fn build_tree(&self, root: &PackageSpecifier) -> Result<DependencyTree> {
        let dep = self.resolve_req(root)?.clone();
        let mut seen = FxHashSet::default();
        Ok(self.build_tree_from(dep, &mut seen))
    }

    fn build_tree_from(&self, dep: Dependency, seen: &mut FxHashSet<CompactString>) -> DependencyTree {
        let mut children = FxHashMap::default();
        if seen.insert(dep.name.clone()) {
            for child_req in dep.iter() {
                if let Some(child) = self.resolved.get(&child_req.name).cloned() {
                    children.insert(
                        child.name.clone(),
                        self.build_tree_from(child, seen),
                    );
                }
            }
        }
        DependencyTree { root: dep, children }
    }
}

async fn resolve_one(
    registry: &Registry,
    req: &PackageSpecifier,
    include_optional: bool,
) -> Result<Dependency> {
    let manifest = registry.fetch_manifest(&req.name).await?;

    let candidate_version = match &req.version {
        VersionSpecifier::Range(range) => {
            let versions: Vec<Version> = manifest
                .versions
                .keys()
                .filter_map(|v| v.parse().ok())
                .collect();
            crate::semver::find_best_version(&versions, range)
                .cloned()
                .ok_or_else(|| eyre!("no version of `{}` satisfies `{}`", req.name, range))?
        }
        VersionSpecifier::Tag(tag) => {
            let resolved = manifest
                .dist_tags
                .get(tag.as_str())
                .or_else(|| manifest.dist_tags.get("latest"))
                .ok_or_else(|| eyre!("no dist-tag `{tag}` for `{}`", req.name))?;
            resolved
                .parse()
                .map_err(|_| eyre!("invalid version for dist-tag `{tag}`"))?
        }
    };

    let entry = manifest
        .versions
        .get(&candidate_version.to_string())
        .ok_or_else(|| eyre!("version `{candidate_version}` of `{}` disappeared", req.name))?;

    let mut dependencies = entry.dependencies.clone();
    for (name, range) in &entry.peer_dependencies {
        let optional = entry
            .peer_dependencies_meta
            .get(name)
            .map(|m| m.optional)
            .unwrap_or(false);
        if !optional {
            dependencies.entry(name.clone()).or_insert_with(|| range.clone());
        }
    }
    if include_optional {
        for (name, range) in &entry.optional_dependencies {
            dependencies.entry(name.clone()).or_insert_with(|| range.clone());
        }
    }

    Ok(Dependency {
        name: req.name.clone(),
        version: candidate_version,
        dist: entry.dist.clone(),
        dependencies,
        bin: entry.bin.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_nests_resolved_children() {
        let mut graph = Graph::default();
        let leaf = Dependency {
            name: "leaf".into(),
            version: "1.0.0".parse().unwrap(),
            dist: Dist { tarball: "http://x/leaf.tgz".into(), shasum: None },
            dependencies: Default::default(),
            bin: BinField::None,
        };
        let mut root_deps = indexmap::IndexMap::new();
        root_deps.insert("leaf".into(), "^1.0.0".into());
        let root = Dependency {
            name: "root".into(),
            version: "2.0.0".parse().unwrap(),
            dist: Dist { tarball: "http://x/root.tgz".into(), shasum: None },
            dependencies: root_deps,
            bin: BinField::None,
        };
        graph.resolved.insert("leaf".into(), leaf);
        graph.resolved.insert("root".into(), root);
        let root_spec = PackageSpecifier { name: "root".into(), version: VersionSpecifier::parse("^2.0.0") };
        graph.relations.insert(root_spec.clone(), graph.resolved["root"].clone());

        let trees = graph.build_trees(&[root_spec]).unwrap();
        assert_eq!(trees.len(), 1);
        assert!(trees[0].children.contains_key("leaf"));
    }
}
