//! Synchronous CommonJS `require()`.
//!
//! Resolution is delegated entirely to [`sprout_vfs::module_loader`]; this
//! module owns what Node calls "the module wrapper": turning resolved source
//! text into a `(function(exports, require, module, __filename, __dirname,
//! process, console, import_meta, __dynamicImport) { ... })` closure, a
//! record cache keyed by resolved path, and the bookkeeping that makes
//! `require("./a")` from inside `a.js` (a cyclic require) return the
//! in-progress `module.exports` instead of recursing forever.
//!
//! Source text is pushed through [`crate::transform`] first, so ESM syntax
//! (`import`/`export`, `import.meta`, dynamic `import()`) works inside the
//! CJS wrapper the same way Node's own ESM-in-CJS interop does.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rsquickjs::prelude::{Async, Func};
use rsquickjs::{Ctx, Exception, Function, IntoJs, JsLifetime, Object, Result, Value};

use sprout_vfs::module_loader::{ModuleFormat, ResolveCache};
use sprout_vfs::Vsys;

use crate::permissions::get_vsys;
use crate::runtime::builtin_module;
use crate::transform;

/// FIFO soft bound on the module record cache. Entries still on the call
/// stack (cyclic requires in flight) are never evicted even past this
/// bound; it only trims modules nobody is currently executing.
const MAX_CACHED_MODULES: usize = 2000;

struct Record<'js> {
    exports: Value<'js>,
}

#[derive(JsLifetime)]
pub struct ModuleCache<'js> {
    records: RefCell<HashMap<String, Record<'js>>>,
    order: RefCell<VecDeque<String>>,
    stack: RefCell<Vec<String>>,
}

impl<'js> Default for ModuleCache<'js> {
    fn default() -> Self {
        Self {
            records: RefCell::new(HashMap::new()),
            order: RefCell::new(VecDeque::new()),
            stack: RefCell::new(Vec::new()),
        }
    }
}

impl<'js> ModuleCache<'js> {
    /// Drops every cached module record, the native equivalent of
    /// deleting every entry from `require.cache`.
    pub(crate) fn clear(&self) {
        self.records.borrow_mut().clear();
        self.order.borrow_mut().clear();
    }
}

/// Installs the module cache and resolve cache as context userdata, and
/// defines the global `require` used by the entry script. Modules loaded
/// via `require()` get their own bound `require` closure (see
/// [`make_require_fn`]); this global one resolves relative to the current
/// working directory, matching how Node treats the entry file.
pub fn init(ctx: &Ctx<'_>, cwd: &str) -> Result<()> {
    if ctx.userdata::<ModuleCache>().is_none() {
        ctx.store_userdata(ModuleCache::default())?;
    }
    if ctx.userdata::<Arc<ResolveCache>>().is_none() {
        ctx.store_userdata(Arc::new(ResolveCache::new()))?;
    }
    let referrer = join(cwd, "__entry__");
    let require_fn = make_require_fn(ctx, referrer)?;
    ctx.globals().set("require", require_fn)?;
    Ok(())
}

fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => ".".to_string(),
    }
}

fn strip_node_prefix(specifier: &str) -> &str {
    specifier.strip_prefix("node:").unwrap_or(specifier)
}

/// Creates a `require` function bound to a fixed referrer path, the way
/// every loaded CJS module gets one bound to its own location.
pub fn make_require_fn<'js>(ctx: &Ctx<'js>, referrer: String) -> Result<Function<'js>> {
    let func = Function::new(ctx.clone(), {
        let referrer = referrer.clone();
        move |ctx: Ctx<'js>, specifier: String| -> Result<Value<'js>> { require(ctx, specifier, referrer.clone()) }
    })?;
    func.set(
        "resolve",
        Func::from({
            let referrer = referrer.clone();
            move |ctx: Ctx<'_>, specifier: String| -> Result<String> { resolve_path(&ctx, &specifier, &referrer) }
        }),
    )?;
    Ok(func)
}

fn resolve_path(ctx: &Ctx<'_>, specifier: &str, referrer: &str) -> Result<String> {
    let vsys = get_vsys(ctx).ok_or_else(|| Exception::throw_message(ctx, "vsys not initialized"))?;
    let cache = resolve_cache(ctx)?;
    let resolved = (vsys.module_loader.resolve)(&vsys.vfs, &vsys.fs, &cache, specifier, referrer, false)
        .map_err(|e| Exception::throw_message(ctx, &format!("Cannot find module '{specifier}': {e}")))?;
    Ok(resolved.path)
}

fn resolve_cache(ctx: &Ctx<'_>) -> Result<Arc<ResolveCache>> {
    Ok((*ctx.userdata::<Arc<ResolveCache>>().ok_or_else(|| Exception::throw_message(ctx, "module loader not initialized"))?).clone())
}

fn module_cache<'js>(ctx: &Ctx<'js>) -> Result<rsquickjs::UserDataGuard<'js, ModuleCache<'js>>> {
    ctx.userdata::<ModuleCache<'js>>()
        .ok_or_else(|| Exception::throw_message(ctx, "module loader not initialized"))
}

/// The synchronous `require()` implementation. `referrer` is the absolute
/// path of the module doing the requiring (used to resolve relative and
/// bare specifiers).
pub fn require<'js>(ctx: Ctx<'js>, specifier: String, referrer: String) -> Result<Value<'js>> {
    let vsys: Arc<Vsys> = get_vsys(&ctx).ok_or_else(|| Exception::throw_message(&ctx, "vsys not initialized"))?;

    if (vsys.module_loader.is_builtin)(&specifier) {
        return builtin_module(&ctx, strip_node_prefix(&specifier));
    }

    let resolve_cache = resolve_cache(&ctx)?;
    let resolved = (vsys.module_loader.resolve)(&vsys.vfs, &vsys.fs, &resolve_cache, &specifier, &referrer, false)
        .map_err(|e| Exception::throw_message(&ctx, &format!("Cannot find module '{specifier}': {e}")))?;

    if resolved.is_builtin {
        return builtin_module(&ctx, strip_node_prefix(&resolved.path));
    }

    let cache = module_cache(&ctx)?;
    if let Some(rec) = cache.records.borrow().get(&resolved.path) {
        return Ok(rec.exports.clone());
    }

    let module_obj = Object::new(ctx.clone())?;
    let exports_obj = Object::new(ctx.clone())?;
    module_obj.set("exports", exports_obj.clone())?;
    module_obj.set("id", resolved.path.clone())?;
    module_obj.set("filename", resolved.path.clone())?;
    module_obj.set("loaded", false)?;

    cache.records.borrow_mut().insert(
        resolved.path.clone(),
        Record {
            exports: exports_obj.clone().into_value(),
        },
    );
    cache.order.borrow_mut().push_back(resolved.path.clone());
    cache.stack.borrow_mut().push(resolved.path.clone());

    let run = || -> Result<()> {
        let source = (vsys.module_loader.load)(&vsys.vfs, &vsys.fs, &resolved.path)
            .map_err(|e| Exception::throw_message(&ctx, &format!("Cannot read module '{}': {e}", resolved.path)))?;

        if matches!(resolved.format, ModuleFormat::Json) {
            let text = String::from_utf8_lossy(&source.source).into_owned();
            let json: Object = ctx.globals().get("JSON")?;
            let parse: Function = json.get("parse")?;
            let parsed: Value = parse.call((text,))?;
            module_obj.set("exports", parsed)?;
            return Ok(());
        }

        let mut code = String::from_utf8_lossy(&source.source).into_owned();
        if let Some(rest) = code.strip_prefix("#!") {
            code = match rest.find('\n') {
                Some(idx) => rest[idx + 1..].to_string(),
                None => String::new(),
            };
        }
        let code = transform::transform(&resolved.path, &code);

        let wrapped = format!(
            "(function(exports, require, module, __filename, __dirname, process, console, import_meta, __dynamicImport) {{\n{code}\n}})",
        );
        let wrapper: Function = ctx.eval(wrapped.into_bytes())?;

        let dirname = parent_dir(&resolved.path);
        let require_fn = make_require_fn(&ctx, resolved.path.clone())?;
        let dynamic_import_fn = make_dynamic_import_fn(&ctx, resolved.path.clone())?;
        let process: Value = ctx.globals().get("process").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
        let console: Value = ctx.globals().get("console").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
        let import_meta = Object::new(ctx.clone())?;
        import_meta.set("url", format!("file://{}", resolved.path))?;

        wrapper.call::<_, ()>((
            exports_obj.clone(),
            require_fn,
            module_obj.clone(),
            resolved.path.clone(),
            dirname,
            process,
            console,
            import_meta,
            dynamic_import_fn,
        ))?;
        module_obj.set("loaded", true)?;
        Ok(())
    };

    let result = run();
    cache.stack.borrow_mut().pop();

    if let Err(e) = result {
        cache.records.borrow_mut().remove(&resolved.path);
        cache.order.borrow_mut().retain(|p| p != &resolved.path);
        return Err(e);
    }

    let final_exports: Value = module_obj.get("exports")?;
    if let Some(rec) = cache.records.borrow_mut().get_mut(&resolved.path) {
        rec.exports = final_exports.clone();
    }
    evict_if_needed(&cache);

    Ok(final_exports)
}

fn evict_if_needed(cache: &ModuleCache<'_>) {
    let mut order = cache.order.borrow_mut();
    let stack = cache.stack.borrow();
    while order.len() > MAX_CACHED_MODULES {
        let Some(front) = order.iter().position(|p| !stack.contains(p)) else {
            break;
        };
        let path = order.remove(front).unwrap();
        cache.records.borrow_mut().remove(&path);
    }
}

/// `import("specifier")` as used from inside a CJS-wrapped module. Resolves
/// via the ESM side of the loader (`is_esm = true`), always returns a
/// settled namespace object (never throws synchronously; rejects instead),
/// and normalizes CJS targets into `{ default, ...ownProperties }` unless
/// the target already looks like an ESM namespace (carries its own
/// `default` or `__esModule`).
pub(crate) fn make_dynamic_import_fn<'js>(ctx: &Ctx<'js>, referrer: String) -> Result<Function<'js>> {
    Function::new(ctx.clone(), Async(move |ctx: Ctx<'js>, specifier: String| {
        let referrer = referrer.clone();
        async move { dynamic_import(ctx, specifier, referrer) }
    }))
}

fn dynamic_import<'js>(ctx: Ctx<'js>, specifier: String, referrer: String) -> Result<Value<'js>> {
    let exports = require(ctx.clone(), specifier, referrer)?;
    to_namespace(&ctx, exports)
}

fn to_namespace<'js>(ctx: &Ctx<'js>, exports: Value<'js>) -> Result<Value<'js>> {
    if let Some(obj) = exports.as_object() {
        let has_default = obj.contains_key("default")?;
        let has_esm_marker = obj.contains_key("__esModule")?;
        if has_default || has_esm_marker {
            return Ok(exports);
        }
        let ns = Object::new(ctx.clone())?;
        for key in obj.keys::<String>() {
            let key = key?;
            let value: Value = obj.get(&key)?;
            ns.set(&key, value)?;
        }
        ns.set("default", exports.clone())?;
        return ns.into_js(ctx);
    }
    let ns = Object::new(ctx.clone())?;
    ns.set("default", exports)?;
    ns.into_js(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_of_nested_path() {
        assert_eq!(parent_dir("/a/b/c.js"), "/a/b");
    }

    #[test]
    fn parent_dir_of_root_child() {
        assert_eq!(parent_dir("/c.js"), "/");
    }

    #[test]
    fn strip_node_prefix_removes_scheme() {
        assert_eq!(strip_node_prefix("node:fs"), "fs");
        assert_eq!(strip_node_prefix("fs"), "fs");
    }

    #[test]
    fn module_cache_defaults_empty() {
        let cache = ModuleCache::default();
        assert!(cache.records.borrow().is_empty());
        assert!(cache.order.borrow().is_empty());
        assert!(cache.stack.borrow().is_empty());
    }
}
