//! Lockfile format: `<cwd>/node_modules/.package-lock.json` —
//! `{ [name]: {version, resolved} }`.

use std::collections::BTreeMap;

use compact_str::CompactString;
use node_semver::Version;
use serde::{Deserialize, Serialize};

use crate::resolver::Graph;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    pub version: Version,
    pub resolved: CompactString,
    #[serde(default)]
    pub shasum: Option<CompactString>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(flatten)]
    pub entries: BTreeMap<CompactString, LockEntry>,
}

impl Lockfile {
    pub fn new(graph: Graph) -> Self {
        let entries = graph
            .resolved
            .into_iter()
            .map(|(name, dep)| {
                (
                    name,
                    LockEntry {
                        version: dep.version,
                        resolved: dep.dist.tarball,
                        shasum: dep.dist.shasum,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}
