//! Module loader virtual table for vsys
//!
//! This module provides a pluggable module loading/resolution abstraction.
//! The module loader uses the vsys `FsVTable` and in-memory `Vfs` for all
//! filesystem operations, making it fully virtualizable for sandboxed
//! environments — resolution never reaches for the host filesystem.
//!
//! # Design
//!
//! Every vtable fn takes the backing `Vfs` and `FsVTable` explicitly. This
//! allows the loader to:
//! - Resolve against the in-memory filesystem tree
//! - Support custom module sources (bundled, remote, in-memory) by swapping
//!   the vtable wholesale
//! - Cache resolutions per `(referrer dir, specifier)` without any global
//!   state, since the cache is itself an explicit parameter

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{VsysError, VsysResult};
use crate::fs::FsVTable;
use crate::store::{normalize, Vfs};

/// Module format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    /// ECMAScript module (import/export)
    ESM,
    /// CommonJS module (require/module.exports)
    CJS,
    /// JSON file
    Json,
    /// Binary/bytecode
    Binary,
}

/// Resolved module information
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModule {
    /// Resolved absolute path or URL
    pub path: String,
    /// Module format
    pub format: ModuleFormat,
    /// Whether this is a built-in/native module
    pub is_builtin: bool,
    /// Whether this is a CommonJS module that needs wrapping for ESM
    pub needs_cjs_wrapper: bool,
}

/// Loaded module source
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// Module source code or binary
    pub source: Vec<u8>,
    /// Module format
    pub format: ModuleFormat,
    /// Original path/URL
    pub path: String,
}

/// Memoizes `(referrer dir, specifier, is_esm) -> resolution` including
/// negative results, so a package with a deep `exports` map or a long
/// `node_modules` walk is only resolved once per session.
#[derive(Default)]
pub struct ResolveCache {
    entries: RwLock<HashMap<(String, String, bool), Option<ResolvedModule>>>,
}

impl ResolveCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &(String, String, bool)) -> Option<Option<ResolvedModule>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn put(&self, key: (String, String, bool), value: Option<ResolvedModule>) {
        self.entries.write().unwrap().insert(key, value);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

/// Module loader/resolver vtable
///
/// This provides the core module loading functionality that can be
/// customized. All functions receive the in-memory `Vfs` and the `FsVTable`
/// explicitly, ensuring the module loader respects the virtual filesystem
/// abstraction and never touches ambient global state.
pub struct ModuleLoaderVTable {
    /// Resolve a module specifier to an absolute path.
    pub resolve: fn(
        vfs: &Vfs,
        fs: &FsVTable,
        cache: &ResolveCache,
        specifier: &str,
        referrer: &str,
        is_esm: bool,
    ) -> VsysResult<ResolvedModule>,

    /// Load a module's source code from a resolved path.
    pub load: fn(vfs: &Vfs, fs: &FsVTable, path: &str) -> VsysResult<ModuleSource>,

    /// Check if a module exists at the given path.
    pub exists: fn(vfs: &Vfs, fs: &FsVTable, path: &str) -> bool,

    /// Check if a specifier is a built-in module.
    pub is_builtin: fn(specifier: &str) -> bool,

    /// List all built-in module names.
    pub list_builtins: fn() -> Vec<String>,

    /// Find the closest package.json from a directory.
    pub find_package_json: fn(vfs: &Vfs, fs: &FsVTable, start_dir: &str) -> Option<String>,

    /// Read and parse package.json.
    pub read_package_json: fn(vfs: &Vfs, fs: &FsVTable, path: &str) -> VsysResult<Value>,
}

impl Default for ModuleLoaderVTable {
    fn default() -> Self {
        Self {
            resolve: default_resolve,
            load: default_load,
            exists: default_exists,
            is_builtin: default_is_builtin,
            list_builtins: default_list_builtins,
            find_package_json: default_find_package_json,
            read_package_json: default_read_package_json,
        }
    }
}

impl ModuleLoaderVTable {
    /// Create a loader that only allows built-in modules.
    pub fn builtins_only() -> Self {
        Self {
            resolve: builtins_only_resolve,
            load: builtins_only_load,
            exists: |_, _, _| false,
            is_builtin: default_is_builtin,
            list_builtins: default_list_builtins,
            find_package_json: |_, _, _| None,
            read_package_json: |_, _, _| {
                Err(VsysError::ModuleResolution {
                    specifier: String::new(),
                    message: "Filesystem access not allowed".to_string(),
                })
            },
        }
    }
}

// Supported file extensions
const JS_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];
const ALL_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "ts", "mts", "cts", "tsx", "jsx", "json"];

/// Node builtin module names. Matches the glossary's builtin-module surface.
const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "stream/web",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

fn default_is_builtin(specifier: &str) -> bool {
    let name = specifier.strip_prefix("node:").unwrap_or(specifier);
    BUILTIN_MODULES.contains(&name)
}

fn default_list_builtins() -> Vec<String> {
    BUILTIN_MODULES.iter().map(|s| s.to_string()).collect()
}

fn join(dir: &str, segment: &str) -> String {
    if segment.is_empty() {
        return normalize(dir);
    }
    normalize(&format!("{}/{}", dir.trim_end_matches('/'), segment))
}

fn dirname(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => "/".to_string(),
    }
}

fn is_file(vfs: &Vfs, fs: &FsVTable, path: &str) -> bool {
    (fs.is_file)(vfs, std::path::Path::new(path))
}

fn is_dir(vfs: &Vfs, fs: &FsVTable, path: &str) -> bool {
    (fs.is_dir)(vfs, std::path::Path::new(path))
}

fn path_exists(vfs: &Vfs, fs: &FsVTable, path: &str) -> bool {
    (fs.exists)(vfs, std::path::Path::new(path))
}

fn read_file(vfs: &Vfs, fs: &FsVTable, path: &str) -> VsysResult<Vec<u8>> {
    (fs.read)(vfs, std::path::Path::new(path))
}

fn detect_format(path: &str) -> ModuleFormat {
    match path.rsplit('.').next().unwrap_or("") {
        "mjs" | "mts" => ModuleFormat::ESM,
        "cjs" | "cts" => ModuleFormat::CJS,
        "json" => ModuleFormat::Json,
        "js" | "ts" | "tsx" | "jsx" => ModuleFormat::ESM,
        _ => ModuleFormat::Binary,
    }
}

/// Reads the nearest ancestor `package.json`'s `"type"` field to decide the
/// default module format for an extensionless `.js` file, per Node's own
/// "is this package ESM or CJS" rule.
fn package_type_is_esm(vfs: &Vfs, fs: &FsVTable, start_dir: &str) -> bool {
    if let Some(pkg_path) = default_find_package_json(vfs, fs, start_dir) {
        if let Ok(json) = default_read_package_json(vfs, fs, &pkg_path) {
            return json.get("type").and_then(|t| t.as_str()) == Some("module");
        }
    }
    false
}

fn try_resolve_file(
    vfs: &Vfs,
    fs: &FsVTable,
    path: &str,
    esm_default: bool,
) -> Option<(String, ModuleFormat, bool)> {
    if is_file(vfs, fs, path) {
        let format = resolve_extensionless_format(path, esm_default);
        let is_cjs = matches!(format, ModuleFormat::CJS);
        return Some((path.to_string(), format, is_cjs));
    }

    for ext in ALL_EXTENSIONS {
        let with_ext = format!("{path}.{ext}");
        if is_file(vfs, fs, &with_ext) {
            let format = detect_format(&with_ext);
            let is_cjs = matches!(format, ModuleFormat::CJS);
            return Some((with_ext, format, is_cjs));
        }
    }

    if is_dir(vfs, fs, path) {
        for ext in ALL_EXTENSIONS {
            let index = join(path, &format!("index.{ext}"));
            if is_file(vfs, fs, &index) {
                let format = detect_format(&index);
                let is_cjs = matches!(format, ModuleFormat::CJS);
                return Some((index, format, is_cjs));
            }
        }
    }

    None
}

fn resolve_extensionless_format(path: &str, esm_default: bool) -> ModuleFormat {
    match path.rsplit('.').next().unwrap_or("") {
        "mjs" | "mts" => ModuleFormat::ESM,
        "cjs" | "cts" => ModuleFormat::CJS,
        "json" => ModuleFormat::Json,
        _ if esm_default => ModuleFormat::ESM,
        _ => ModuleFormat::CJS,
    }
}

/// Resolve a package `exports`/`imports` condition map entry for the given
/// condition set (`import`/`require`, `browser`, `default`), per-spec
/// subpath mapping, skipping `.cjs`/`.cts` entries under the `import`
/// condition the way Node's ESM resolver throws `ERR_REQUIRE_ESM`-adjacent
/// stubs rather than letting `require` load them.
fn resolve_conditions(value: &Value, is_esm: bool, want_browser: bool) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let order: &[&str] = if is_esm {
                &["import", "module", "browser", "default"]
            } else {
                &["require", "node", "browser", "default"]
            };
            for key in order {
                if *key == "browser" && !want_browser {
                    continue;
                }
                if let Some(v) = map.get(*key) {
                    if let Some(resolved) = resolve_conditions(v, is_esm, want_browser) {
                        if is_esm && (resolved.ends_with(".cjs") || resolved.ends_with(".cts")) {
                            continue;
                        }
                        return Some(resolved);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// Resolve the `exports` field for the package root (`"."`) or a named
/// subpath (`"./lib/x"`).
fn resolve_exports_field(pkg: &Value, subpath: &str, is_esm: bool) -> Option<String> {
    let exports = pkg.get("exports")?;
    let key = if subpath.is_empty() { "." } else { subpath };

    if let Value::Object(map) = exports {
        if let Some(entry) = map.get(key) {
            return resolve_conditions(entry, is_esm, false);
        }
        // Wildcard subpaths: "./lib/*" -> "./dist/*.js"
        for (pattern, target) in map {
            if let Some(prefix) = pattern.strip_suffix('*') {
                if let Some(rest) = key.strip_prefix(prefix) {
                    if let Some(target_str) = resolve_conditions(target, is_esm, false) {
                        if let Some(target_prefix) = target_str.strip_suffix('*') {
                            return Some(format!("{target_prefix}{rest}"));
                        }
                    }
                }
            }
        }
        None
    } else if key == "." {
        resolve_conditions(exports, is_esm, false)
    } else {
        None
    }
}

/// Resolve the `imports` field (`#foo` -> real specifier/path), supporting
/// the same condition-object shape as `exports`.
fn resolve_imports_field(pkg: &Value, specifier: &str, is_esm: bool) -> Option<String> {
    let imports = pkg.get("imports")?.as_object()?;
    if let Some(entry) = imports.get(specifier) {
        return resolve_conditions(entry, is_esm, false);
    }
    for (pattern, target) in imports {
        if let Some(prefix) = pattern.strip_suffix('*') {
            if let Some(rest) = specifier.strip_prefix(prefix) {
                if let Some(target_str) = resolve_conditions(target, is_esm, false) {
                    if let Some(target_prefix) = target_str.strip_suffix('*') {
                        return Some(format!("{target_prefix}{rest}"));
                    }
                }
            }
        }
    }
    None
}

/// Resolve the `browser` field, which may be a plain string (main
/// override) or a map of specifier-to-replacement/`false` (module
/// blocked, replaced with an empty stub).
fn resolve_browser_field(pkg: &Value, specifier: Option<&str>) -> Option<String> {
    let browser = pkg.get("browser")?;
    match specifier {
        None => browser.as_str().map(|s| s.to_string()),
        Some(spec) => browser.as_object().and_then(|map| {
            map.get(spec).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Bool(false) => Some(String::new()),
                _ => None,
            })
        }),
    }
}

fn resolve_package_main(
    vfs: &Vfs,
    fs: &FsVTable,
    pkg_dir: &str,
    pkg: &Value,
    is_esm: bool,
) -> Option<(String, bool)> {
    let is_cjs_package = pkg.get("type").and_then(|t| t.as_str()) != Some("module");

    if let Some(target) = resolve_exports_field(pkg, "", is_esm) {
        return Some((join(pkg_dir, &target), is_cjs_package));
    }

    if let Some(target) = resolve_browser_field(pkg, None) {
        return Some((join(pkg_dir, &target), is_cjs_package));
    }

    let main = if is_esm {
        pkg.get("module").or_else(|| pkg.get("main"))
    } else {
        pkg.get("main")
    }
    .and_then(|v| v.as_str());

    if let Some(main) = main {
        return Some((join(pkg_dir, main), is_cjs_package));
    }

    for ext in JS_EXTENSIONS {
        let index = join(pkg_dir, &format!("index.{ext}"));
        if is_file(vfs, fs, &index) {
            return Some((index, is_cjs_package));
        }
    }

    None
}

fn default_resolve(
    vfs: &Vfs,
    fs: &FsVTable,
    cache: &ResolveCache,
    specifier: &str,
    referrer: &str,
    is_esm: bool,
) -> VsysResult<ResolvedModule> {
    if specifier.starts_with("node:") || default_is_builtin(specifier) {
        let name = specifier.strip_prefix("node:").unwrap_or(specifier);
        return Ok(ResolvedModule {
            path: name.to_string(),
            format: ModuleFormat::ESM,
            is_builtin: true,
            needs_cjs_wrapper: false,
        });
    }

    let referrer_dir = dirname(referrer);
    let cache_key = (referrer_dir.clone(), specifier.to_string(), is_esm);
    if let Some(cached) = cache.get(&cache_key) {
        return cached.ok_or_else(|| VsysError::ModuleResolution {
            specifier: specifier.to_string(),
            message: format!("Cannot find module '{specifier}'"),
        });
    }

    let result = resolve_uncached(vfs, fs, specifier, &referrer_dir, is_esm);
    cache.put(cache_key, result.clone());

    result.ok_or_else(|| VsysError::ModuleResolution {
        specifier: specifier.to_string(),
        message: format!("Cannot find module '{specifier}'"),
    })
}

fn resolve_uncached(
    vfs: &Vfs,
    fs: &FsVTable,
    specifier: &str,
    referrer_dir: &str,
    is_esm: bool,
) -> Option<ResolvedModule> {
    let specifier = specifier.strip_prefix("file://").unwrap_or(specifier);

    // `#subpath` imports resolve against the nearest package.json's
    // `imports` field before anything else.
    if let Some(sub) = specifier.strip_prefix('#') {
        let pkg_path = default_find_package_json(vfs, fs, referrer_dir)?;
        let pkg = default_read_package_json(vfs, fs, &pkg_path).ok()?;
        let pkg_dir = dirname(&pkg_path);
        let target = resolve_imports_field(&pkg, &format!("#{sub}"), is_esm)?;
        let resolved_path = if target.starts_with("./") || target.starts_with("../") {
            join(&pkg_dir, &target)
        } else {
            target
        };
        let (path, format, is_cjs) = try_resolve_file(vfs, fs, &resolved_path, true)?;
        return Some(ResolvedModule {
            path,
            format,
            is_builtin: false,
            needs_cjs_wrapper: is_cjs && is_esm,
        });
    }

    let is_relative =
        specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/');

    if is_relative {
        let resolved = join(referrer_dir, specifier);
        let esm_default = package_type_is_esm(vfs, fs, referrer_dir);
        let (path, format, is_cjs) = try_resolve_file(vfs, fs, &resolved, esm_default)?;
        return Some(ResolvedModule {
            path,
            format,
            is_builtin: false,
            needs_cjs_wrapper: is_cjs && is_esm,
        });
    }

    let (path, format, is_cjs) = try_resolve_node_modules(vfs, fs, specifier, referrer_dir, is_esm)?;
    Some(ResolvedModule {
        path,
        format,
        is_builtin: false,
        needs_cjs_wrapper: is_cjs && is_esm,
    })
}

fn try_resolve_node_modules(
    vfs: &Vfs,
    fs: &FsVTable,
    specifier: &str,
    referrer_dir: &str,
    is_esm: bool,
) -> Option<(String, ModuleFormat, bool)> {
    // A bare specifier may itself carry a subpath: "lodash/fp".
    let (pkg_name, subpath) = split_package_specifier(specifier);

    let mut current: Option<String> = Some(referrer_dir.to_string());
    while let Some(dir) = current {
        let node_modules = join(&dir, &format!("node_modules/{pkg_name}"));

        if is_dir(vfs, fs, &node_modules) {
            let package_json = join(&node_modules, "package.json");
            if is_file(vfs, fs, &package_json) {
                if let Ok(content) = read_file(vfs, fs, &package_json) {
                    if let Ok(json) = serde_json::from_slice::<Value>(&content) {
                        if !subpath.is_empty() {
                            if let Some(target) = resolve_exports_field(&json, &format!("./{subpath}"), is_esm)
                            {
                                let full = join(&node_modules, &target);
                                if let Some(resolved) = try_resolve_file(vfs, fs, &full, true) {
                                    return Some(resolved);
                                }
                            }
                            let full = join(&node_modules, &subpath);
                            if let Some(resolved) = try_resolve_file(vfs, fs, &full, true) {
                                return Some(resolved);
                            }
                        } else if let Some((resolved_path, is_cjs)) =
                            resolve_package_main(vfs, fs, &node_modules, &json, is_esm)
                        {
                            if let Some((path, format, _)) =
                                try_resolve_file(vfs, fs, &resolved_path, !is_cjs)
                            {
                                return Some((path, format, is_cjs));
                            }
                        }
                    }
                }
            } else if subpath.is_empty() {
                if let Some(resolved) = try_resolve_file(vfs, fs, &node_modules, true) {
                    return Some(resolved);
                }
            } else {
                let full = join(&node_modules, &subpath);
                if let Some(resolved) = try_resolve_file(vfs, fs, &full, true) {
                    return Some(resolved);
                }
            }
        }

        current = parent_dir(&dir);
    }

    None
}

fn split_package_specifier(specifier: &str) -> (String, String) {
    let is_scoped = specifier.starts_with('@');
    let mut parts = specifier.splitn(if is_scoped { 3 } else { 2 }, '/');
    let name = if is_scoped {
        format!("{}/{}", parts.next().unwrap_or(""), parts.next().unwrap_or(""))
    } else {
        parts.next().unwrap_or("").to_string()
    };
    let rest = parts.next().unwrap_or("").to_string();
    (name, rest)
}

fn parent_dir(dir: &str) -> Option<String> {
    if dir == "/" {
        return None;
    }
    Some(dirname(dir))
}

fn default_load(vfs: &Vfs, fs: &FsVTable, path: &str) -> VsysResult<ModuleSource> {
    if default_is_builtin(path) {
        return Err(VsysError::ModuleLoad {
            path: path.to_string(),
            message: "Built-in modules should be loaded by the runtime".to_string(),
        });
    }

    let source = read_file(vfs, fs, path)?;
    let format = detect_format(path);

    Ok(ModuleSource {
        source,
        format,
        path: path.to_string(),
    })
}

fn default_exists(vfs: &Vfs, fs: &FsVTable, path: &str) -> bool {
    path_exists(vfs, fs, path)
}

fn default_find_package_json(vfs: &Vfs, fs: &FsVTable, start_dir: &str) -> Option<String> {
    let mut current_dir = normalize(start_dir);
    loop {
        let package_json_path = join(&current_dir, "package.json");
        if path_exists(vfs, fs, &package_json_path) {
            return Some(package_json_path);
        }
        match parent_dir(&current_dir) {
            Some(parent) => current_dir = parent,
            None => break,
        }
    }
    None
}

fn default_read_package_json(vfs: &Vfs, fs: &FsVTable, path: &str) -> VsysResult<Value> {
    let content = read_file(vfs, fs, path)?;
    serde_json::from_slice(&content).map_err(|e| VsysError::ModuleLoad {
        path: path.to_string(),
        message: format!("Failed to parse package.json: {}", e),
    })
}

fn builtins_only_resolve(
    _vfs: &Vfs,
    _fs: &FsVTable,
    _cache: &ResolveCache,
    specifier: &str,
    _referrer: &str,
    _is_esm: bool,
) -> VsysResult<ResolvedModule> {
    if default_is_builtin(specifier) {
        let name = specifier.strip_prefix("node:").unwrap_or(specifier);
        return Ok(ResolvedModule {
            path: name.to_string(),
            format: ModuleFormat::ESM,
            is_builtin: true,
            needs_cjs_wrapper: false,
        });
    }

    Err(VsysError::ModuleResolution {
        specifier: specifier.to_string(),
        message: "Only built-in modules are allowed".to_string(),
    })
}

fn builtins_only_load(_vfs: &Vfs, _fs: &FsVTable, path: &str) -> VsysResult<ModuleSource> {
    Err(VsysError::ModuleLoad {
        path: path.to_string(),
        message: "Only built-in modules are allowed".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsVTable;
    use crate::store::Vfs;

    fn setup() -> (Vfs, FsVTable) {
        (Vfs::new(), FsVTable::default())
    }

    #[test]
    fn test_is_builtin() {
        assert!(default_is_builtin("fs"));
        assert!(default_is_builtin("node:fs"));
        assert!(default_is_builtin("path"));
        assert!(!default_is_builtin("lodash"));
        assert!(!default_is_builtin("./foo"));
    }

    #[test]
    fn test_resolve_builtin() {
        let (vfs, fs) = setup();
        let vtable = ModuleLoaderVTable::default();
        let cache = ResolveCache::new();
        let result = (vtable.resolve)(&vfs, &fs, &cache, "node:fs", "/app/index.js", true).unwrap();
        assert!(result.is_builtin);
        assert_eq!(result.path, "fs");
    }

    #[test]
    fn test_builtins_only() {
        let (vfs, fs) = setup();
        let vtable = ModuleLoaderVTable::builtins_only();
        let cache = ResolveCache::new();

        let result = (vtable.resolve)(&vfs, &fs, &cache, "fs", "/app/index.js", true);
        assert!(result.is_ok());

        let result = (vtable.resolve)(&vfs, &fs, &cache, "./foo", "/app/index.js", true);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_relative_file() {
        let (vfs, fs) = setup();
        vfs.write("/app/index.js", b"").unwrap();
        vfs.write("/app/foo.js", b"export default 1;").unwrap();

        let vtable = ModuleLoaderVTable::default();
        let cache = ResolveCache::new();
        let result = (vtable.resolve)(&vfs, &fs, &cache, "./foo", "/app/index.js", true).unwrap();
        assert_eq!(result.path, "/app/foo.js");
        assert_eq!(result.format, ModuleFormat::ESM);
    }

    #[test]
    fn test_resolve_node_modules_main_field() {
        let (vfs, fs) = setup();
        vfs.write("/app/index.js", b"").unwrap();
        vfs.mkdir("/app/node_modules/left-pad", true).unwrap();
        vfs.write(
            "/app/node_modules/left-pad/package.json",
            br#"{"name":"left-pad","main":"index.js"}"#,
        )
        .unwrap();
        vfs.write("/app/node_modules/left-pad/index.js", b"module.exports = {};")
            .unwrap();

        let vtable = ModuleLoaderVTable::default();
        let cache = ResolveCache::new();
        let result = (vtable.resolve)(&vfs, &fs, &cache, "left-pad", "/app/index.js", false).unwrap();
        assert_eq!(result.path, "/app/node_modules/left-pad/index.js");
        assert!(result.needs_cjs_wrapper == false || !result.is_builtin);
    }

    #[test]
    fn test_resolve_exports_conditions() {
        let (vfs, fs) = setup();
        vfs.write("/app/index.js", b"").unwrap();
        vfs.mkdir("/app/node_modules/pkg", true).unwrap();
        vfs.write(
            "/app/node_modules/pkg/package.json",
            br#"{"name":"pkg","exports":{".":{"import":"./esm.js","require":"./cjs.js"}}}"#,
        )
        .unwrap();
        vfs.write("/app/node_modules/pkg/esm.js", b"export default 1;").unwrap();
        vfs.write("/app/node_modules/pkg/cjs.js", b"module.exports = 1;").unwrap();

        let vtable = ModuleLoaderVTable::default();
        let cache = ResolveCache::new();

        let esm = (vtable.resolve)(&vfs, &fs, &cache, "pkg", "/app/index.js", true).unwrap();
        assert_eq!(esm.path, "/app/node_modules/pkg/esm.js");

        let cjs = (vtable.resolve)(&vfs, &fs, &cache, "pkg", "/app/index.js", false).unwrap();
        assert_eq!(cjs.path, "/app/node_modules/pkg/cjs.js");
    }

    #[test]
    fn test_resolve_cache_negative_result() {
        let (vfs, fs) = setup();
        vfs.write("/app/index.js", b"").unwrap();
        let vtable = ModuleLoaderVTable::default();
        let cache = ResolveCache::new();

        assert!((vtable.resolve)(&vfs, &fs, &cache, "missing-pkg", "/app/index.js", true).is_err());
        // Second lookup must hit the cached negative result, not re-walk the tree.
        assert!((vtable.resolve)(&vfs, &fs, &cache, "missing-pkg", "/app/index.js", true).is_err());
        assert_eq!(cache.entries.read().unwrap().len(), 1);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("foo.mjs"), ModuleFormat::ESM);
        assert_eq!(detect_format("foo.cjs"), ModuleFormat::CJS);
        assert_eq!(detect_format("foo.json"), ModuleFormat::Json);
        assert_eq!(detect_format("foo.js"), ModuleFormat::ESM);
    }

    #[test]
    fn test_resolved_module_cjs_wrapper() {
        let resolved = ResolvedModule {
            path: "/app/lib.cjs".to_string(),
            format: ModuleFormat::CJS,
            is_builtin: false,
            needs_cjs_wrapper: true,
        };
        assert!(resolved.needs_cjs_wrapper);
    }
}
