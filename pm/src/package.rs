//! `package.json` shape: the subset the installer reads and writes.
//!
//! Grounded on the call sites in `plan.rs`/`commands/*.rs` (package.iter_all,
//! .dependencies, .dev_dependencies, .scripts, .bin) plus spec.md §3's
//! "Registry manifest" shape for the version-entry fields.

use std::collections::HashMap;

use color_eyre::eyre::{Result, WrapErr};
use compact_str::CompactString;
use indexmap::IndexMap;
use node_semver::{Range, Version};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sprout_vfs::Vfs;

/// A dependency range as written in `package.json` or a manifest's
/// `dependencies` map: usually a semver range, occasionally a dist-tag or
/// an unsupported protocol (`git+...`, `file:...`, `workspace:*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpecifier {
    Range(Range),
    Tag(CompactString),
}

impl VersionSpecifier {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Range>() {
            Ok(range) => VersionSpecifier::Range(range),
            Err(_) => VersionSpecifier::Tag(raw.into()),
        }
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionSpecifier::Range(range) => range.satisfies(version),
            VersionSpecifier::Tag(_) => false,
        }
    }
}

/// One `(name, range)` entry, as it appears in a `dependencies` map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpecifier {
    pub name: CompactString,
    pub version: VersionSpecifier,
}

impl std::fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            VersionSpecifier::Range(r) => write!(f, "{}@{}", self.name, r),
            VersionSpecifier::Tag(t) => write!(f, "{}@{}", self.name, t),
        }
    }
}

/// `bin` field: either a single command named after the package, or a map
/// of command name to script path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinField {
    #[default]
    None,
    Single(CompactString),
    Map(IndexMap<CompactString, CompactString>),
}

impl BinField {
    /// Flatten into `(command, script path)` pairs, naming the single form
    /// after `package_name`.
    pub fn entries(&self, package_name: &str) -> Vec<(CompactString, CompactString)> {
        match self {
            BinField::None => Vec::new(),
            BinField::Single(path) => vec![(package_name.into(), path.clone())],
            BinField::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

/// The subset of `package.json` the installer reads/writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: CompactString,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub dependencies: IndexMap<CompactString, CompactString>,
    #[serde(rename = "devDependencies", default)]
    pub dev_dependencies: IndexMap<CompactString, CompactString>,
    #[serde(rename = "optionalDependencies", default)]
    pub optional_dependencies: IndexMap<CompactString, CompactString>,
    #[serde(rename = "peerDependencies", default)]
    pub peer_dependencies: IndexMap<CompactString, CompactString>,
    #[serde(default)]
    pub scripts: Map<String, Value>,
    #[serde(default)]
    pub bin: BinField,
    /// Fields not otherwise modeled (`main`, `module`, `exports`, ...);
    /// preserved so `save_package` doesn't drop them.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Default for PackageMetadata {
    fn default() -> Self {
        Self {
            name: CompactString::default(),
            version: None,
            dependencies: IndexMap::new(),
            dev_dependencies: IndexMap::new(),
            optional_dependencies: IndexMap::new(),
            peer_dependencies: IndexMap::new(),
            scripts: Map::new(),
            bin: BinField::None,
            rest: Map::new(),
        }
    }
}

impl PackageMetadata {
    /// All direct dependencies plus devDependencies, as specifiers.
    pub fn iter_all(&self) -> impl Iterator<Item = PackageSpecifier> + '_ {
        self.dependencies
            .iter()
            .chain(self.dev_dependencies.iter())
            .map(|(name, range)| PackageSpecifier {
                name: name.clone(),
                version: VersionSpecifier::parse(range),
            })
    }
}

fn package_json_path(cwd: &str) -> String {
    format!("{}/package.json", cwd.trim_end_matches('/'))
}

/// Read and parse `<cwd>/package.json`, erroring if it's missing or invalid.
pub async fn read_package(vfs: &Vfs, cwd: &str) -> Result<PackageMetadata> {
    let bytes = vfs
        .read(&package_json_path(cwd))
        .map_err(|e| color_eyre::eyre::eyre!("{e}"))
        .wrap_err("failed to read package.json")?;
    serde_json::from_slice(&bytes).wrap_err("`package.json` is invalid")
}

/// Read `<cwd>/package.json` as a raw JSON value, defaulting to `{}` when
/// the file does not yet exist (fresh project).
pub async fn read_package_or_default(vfs: &Vfs, cwd: &str) -> Result<Value> {
    match vfs.read(&package_json_path(cwd)) {
        Ok(bytes) => serde_json::from_slice(&bytes).wrap_err("`package.json` is invalid"),
        Err(_) => Ok(Value::Object(Map::new())),
    }
}

/// Write a (possibly partial) `package.json` value back into the VFS,
/// pretty-printed as `npm init` output is.
pub async fn save_package(vfs: &Vfs, cwd: &str, package: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(package)?;
    vfs.write(&package_json_path(cwd), text.as_bytes())
        .map_err(|e| color_eyre::eyre::eyre!("{e}"))?;
    Ok(())
}

/// A registry manifest's per-version entry (spec.md §3 "Registry manifest").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestVersion {
    pub name: CompactString,
    pub version: Version,
    #[serde(default)]
    pub dependencies: IndexMap<CompactString, CompactString>,
    #[serde(rename = "peerDependencies", default)]
    pub peer_dependencies: IndexMap<CompactString, CompactString>,
    #[serde(rename = "peerDependenciesMeta", default)]
    pub peer_dependencies_meta: HashMap<CompactString, PeerMeta>,
    #[serde(rename = "optionalDependencies", default)]
    pub optional_dependencies: IndexMap<CompactString, CompactString>,
    pub dist: Dist,
    #[serde(default)]
    pub main: Option<CompactString>,
    #[serde(default)]
    pub module: Option<CompactString>,
    #[serde(default)]
    pub browser: Option<Value>,
    #[serde(default)]
    pub exports: Option<Value>,
    #[serde(default)]
    pub bin: BinField,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerMeta {
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dist {
    pub tarball: CompactString,
    #[serde(default)]
    pub shasum: Option<CompactString>,
}

/// A full registry manifest document: `{ name, 'dist-tags', versions }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryManifest {
    pub name: CompactString,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<CompactString, CompactString>,
    pub versions: HashMap<String, ManifestVersion>,
}
