//! Everything that turns a bare `rsquickjs::Context` into a Node-shaped
//! runtime: the `process` mirror, the builtin module registry `require()`
//! dispatches into, a handful of host polyfills Node ships that QuickJS
//! doesn't, and the facade ([`Runtime`]) that ties execution, the module
//! cache, and the REPL's binding-persistence trick together.

use std::collections::HashMap;

use rsquickjs::function::Rest;
use rsquickjs::prelude::Func;
use rsquickjs::{CatchResultExt, Context, Ctx, Exception, Object, Persistent, Result, Runtime as QjsRuntime, Value};

use sprout_vfs::Vsys;
use std::sync::Arc;

use crate::console::LogType;
use crate::loader;

/// Process-level configuration a host passes in at construction time —
/// the native analogue of `createRuntime`'s `{ cwd, env, ... }` options.
#[derive(Clone, Debug)]
pub struct RuntimeOptions {
    pub cwd: String,
    pub env: HashMap<String, String>,
    pub argv: Vec<String>,
    pub log_type: LogType,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            cwd: "/".to_string(),
            env: HashMap::new(),
            argv: vec!["node".to_string()],
            log_type: LogType::Stdio,
        }
    }
}

/// Builds the `process` global: `cwd()`, `env`, `argv`, `platform`,
/// `version`, `exit()`, `nextTick()`, and a `stdout`/`stderr` pair whose
/// `.write()` just reuses the console machinery's formatter.
fn init_process(ctx: &Ctx<'_>, opts: &RuntimeOptions) -> Result<()> {
    let process = Object::new(ctx.clone())?;
    let cwd = opts.cwd.clone();
    process.set("cwd", Func::from(move || cwd.clone()))?;

    let env = Object::new(ctx.clone())?;
    for (k, v) in &opts.env {
        env.set(k, v.clone())?;
    }
    process.set("env", env)?;

    let argv: Vec<String> = opts.argv.clone();
    process.set("argv", argv)?;
    process.set("platform", "browser")?;
    process.set("version", "v20.0.0-sprout")?;
    process.set("versions", {
        let versions = Object::new(ctx.clone())?;
        versions.set("node", "20.0.0-sprout")?;
        versions
    })?;

    process.set(
        "exit",
        Func::from(|ctx: Ctx<'_>, code: rsquickjs::function::Opt<i32>| -> Result<()> {
            Err(Exception::throw_message(&ctx, &format!("process.exit({})", code.0.unwrap_or(0))))
        }),
    )?;

    process.set(
        "nextTick",
        Func::from(|ctx: Ctx<'_>, callback: rsquickjs::Function<'_>, args: Rest<Value<'_>>| -> Result<()> {
            use crate::utils::ctx::CtxExtension;
            let args: Vec<Value<'_>> = args.0;
            ctx.clone().spawn_exit_simple(async move { callback.call::<_, ()>(args) });
            Ok(())
        }),
    )?;

    let stdout = Object::new(ctx.clone())?;
    stdout.set(
        "write",
        Func::from(|ctx: Ctx<'_>, text: String| -> Result<bool> {
            crate::console::write_log(std::io::stdout(), &ctx, Rest(vec![rsquickjs::IntoJs::into_js(text, &ctx)?]))?;
            Ok(true)
        }),
    )?;
    process.set("stdout", stdout)?;

    let stderr = Object::new(ctx.clone())?;
    stderr.set(
        "write",
        Func::from(|ctx: Ctx<'_>, text: String| -> Result<bool> {
            crate::console::write_log(std::io::stderr(), &ctx, Rest(vec![rsquickjs::IntoJs::into_js(text, &ctx)?]))?;
            Ok(true)
        }),
    )?;
    process.set("stderr", stderr)?;

    ctx.globals().set("process", process)?;
    Ok(())
}

/// Best-effort `Error.captureStackTrace`/`prepareStackTrace` polyfill.
/// QuickJS doesn't expose V8's structured-stack-trace API at all; this
/// gives scripts that feature-detect it (`typeof Error.captureStackTrace
/// === "function"`) something to call instead of crashing, at the cost of
/// the trace being approximate (current `.stack` text reformatted) rather
/// than a real `CallSite[]`.
const ERROR_POLYFILL_SRC: &str = r#"
(function() {
    if (typeof Error.captureStackTrace !== "function") {
        Error.captureStackTrace = function(target, constructorOpt) {
            var stack = (new Error()).stack || "";
            var lines = stack.split("\n").slice(1);
            if (typeof Error.prepareStackTrace === "function") {
                var callSites = lines.map(function(line) {
                    return {
                        getFileName: function() { return null; },
                        getLineNumber: function() { return null; },
                        toString: function() { return line; },
                    };
                });
                target.stack = Error.prepareStackTrace(target, callSites);
            } else {
                target.stack = (target.name || "Error") + ": " + (target.message || "") + "\n" + lines.join("\n");
            }
        };
    }
    if (typeof Error.stackTraceLimit !== "number") {
        Error.stackTraceLimit = 10;
    }
})();
"#;

/// `setTimeout`/`setInterval` in Node return a `Timeout` object, not a raw
/// number: something with `.ref()`, `.unref()`, `.hasRef()`, `.refresh()`
/// and a `Symbol.toPrimitive` so `+timeout` still works for code that
/// expects the old numeric id. `timers.rs` hands back a plain id; this
/// wraps it at the JS layer rather than reworking the Rust timer wheel.
const TIMER_WRAPPER_SRC: &str = r#"
(function() {
    function wrap(id, reschedule) {
        var refd = true;
        return {
            ref: function() { refd = true; return this; },
            unref: function() { refd = false; return this; },
            hasRef: function() { return refd; },
            refresh: function() {
                if (reschedule) { id = reschedule(); }
                return this;
            },
            [Symbol.toPrimitive]: function() { return id; },
            valueOf: function() { return id; },
        };
    }
    var realSetTimeout = globalThis.setTimeout;
    var realSetInterval = globalThis.setInterval;
    globalThis.setTimeout = function(cb, delay) {
        var args = Array.prototype.slice.call(arguments, 2);
        var id = realSetTimeout.apply(null, [cb, delay].concat(args));
        return wrap(id, function() { return realSetTimeout.apply(null, [cb, delay].concat(args)); });
    };
    globalThis.setInterval = function(cb, delay) {
        var args = Array.prototype.slice.call(arguments, 2);
        var id = realSetInterval.apply(null, [cb, delay].concat(args));
        return wrap(id, function() { return realSetInterval.apply(null, [cb, delay].concat(args)); });
    };
    var realClearTimeout = globalThis.clearTimeout;
    var realClearInterval = globalThis.clearInterval;
    globalThis.clearTimeout = function(t) { realClearTimeout(+t); };
    globalThis.clearInterval = function(t) { realClearInterval(+t); };
})();
"#;

/// Minimal `TextDecoder`. Only `utf-8`/`utf8` is decoded precisely (via
/// Rust's lossy conversion, surfaced through `Buffer`'s existing
/// `toString`); everything else Node supports (`latin1`, `utf-16le`, ...)
/// is out of scope here and falls back to utf-8 decoding.
const TEXT_DECODER_SRC: &str = r#"
(function() {
    if (typeof globalThis.TextDecoder === "undefined") {
        globalThis.TextDecoder = function(encoding) {
            this.encoding = (encoding || "utf-8").toLowerCase();
        };
        globalThis.TextDecoder.prototype.decode = function(bytes) {
            var buf = bytes instanceof Uint8Array ? Buffer.from(bytes) : Buffer.from(bytes || []);
            return buf.toString("utf8");
        };
    }
    if (typeof globalThis.TextEncoder === "undefined") {
        globalThis.TextEncoder = function() { this.encoding = "utf-8"; };
        globalThis.TextEncoder.prototype.encode = function(str) {
            return new Uint8Array(Buffer.from(str, "utf8"));
        };
    }
})();
"#;

fn install_polyfills(ctx: &Ctx<'_>) -> Result<()> {
    ctx.eval::<(), _>(ERROR_POLYFILL_SRC)?;
    ctx.eval::<(), _>(TIMER_WRAPPER_SRC)?;
    ctx.eval::<(), _>(TEXT_DECODER_SRC)?;
    Ok(())
}

/// Builds a namespace `Object` for a builtin specifier, the way
/// `require("fs")` expects one back. Builtins are backed by the modules
/// already registered as globals/classes during [`crate::init`] — this
/// just assembles the CJS-shaped view of them instead of running a second
/// copy through `rsquickjs`'s native ESM `ModuleDef` machinery.
pub fn builtin_module<'js>(ctx: &Ctx<'js>, name: &str) -> Result<Value<'js>> {
    let globals = ctx.globals();
    match name {
        "console" => globals.get("console"),
        "buffer" => {
            let ns = Object::new(ctx.clone())?;
            let buffer_ctor: Value = globals.get("Buffer")?;
            ns.set("Buffer", buffer_ctor)?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "path" => globals.get("__pathModule"),
        "url" => {
            let ns = Object::new(ctx.clone())?;
            ns.set("URL", globals.get::<_, Value>("URL")?)?;
            ns.set("URLSearchParams", globals.get::<_, Value>("URLSearchParams")?)?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "events" => {
            let ns = Object::new(ctx.clone())?;
            ns.set("EventEmitter", globals.get::<_, Value>("EventEmitter")?)?;
            ns.set("default", globals.get::<_, Value>("EventEmitter")?)?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "timers" => {
            let ns = Object::new(ctx.clone())?;
            for fn_name in ["setTimeout", "setInterval", "setImmediate", "clearTimeout", "clearInterval", "clearImmediate"] {
                ns.set(fn_name, globals.get::<_, Value>(fn_name)?)?;
            }
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "async_hooks" => {
            let ns = Object::new(ctx.clone())?;
            ns.set("createHook", Func::from(crate::async_hooks::create_hook))?;
            ns.set("currentId", Func::from(crate::async_hooks::current_id))?;
            ns.set("executionAsyncId", Func::from(crate::async_hooks::execution_async_id))?;
            ns.set("triggerAsyncId", Func::from(crate::async_hooks::trigger_async_id))?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "fs" => {
            let ns = Object::new(ctx.clone())?;
            crate::fs::export_constants(ctx, &ns)?;
            let promises = Object::new(ctx.clone())?;
            crate::fs::export_promises(ctx, &promises)?;
            ns.set("promises", promises)?;
            ns.set("accessSync", Func::from(crate::fs::access_sync))?;
            ns.set("mkdirSync", Func::from(crate::fs::mkdir_sync))?;
            ns.set("mkdtempSync", Func::from(crate::fs::mkdtemp_sync))?;
            ns.set("readdirSync", Func::from(crate::fs::read_dir_sync))?;
            ns.set("readFileSync", Func::from(crate::fs::read_file_sync))?;
            ns.set("rmdirSync", Func::from(crate::fs::rmdir_sync))?;
            ns.set("rmSync", Func::from(crate::fs::rmfile_sync))?;
            ns.set("statSync", Func::from(crate::fs::stat_fn_sync))?;
            ns.set("lstatSync", Func::from(crate::fs::lstat_fn_sync))?;
            ns.set("writeFileSync", Func::from(crate::fs::write_file_sync))?;
            ns.set("chmodSync", Func::from(crate::fs::chmod_sync))?;
            ns.set("renameSync", Func::from(crate::fs::rename_sync))?;
            ns.set("symlinkSync", Func::from(crate::fs::symlink_sync))?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "fs/promises" => {
            let ns = Object::new(ctx.clone())?;
            crate::fs::export_promises(ctx, &ns)?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        "process" => globals.get("process"),
        "module" => {
            let ns = Object::new(ctx.clone())?;
            let create_require = rsquickjs::Function::new(ctx.clone(), |ctx: Ctx<'_>, url_or_path: String| -> Result<rsquickjs::Function<'_>> {
                let referrer = url_or_path.strip_prefix("file://").unwrap_or(&url_or_path).to_string();
                loader::make_require_fn(&ctx, referrer)
            })?;
            ns.set("createRequire", create_require)?;
            rsquickjs::IntoJs::into_js(ns, ctx)
        }
        #[cfg(feature = "crypto")]
        "crypto" => globals.get("crypto"),
        // Node builtins with no virtualizable equivalent in this runtime
        // (no real sockets/processes/TTYs exist under the VFS model) get
        // an empty namespace instead of "module not found", matching how
        // bundlers usually shim these out for browser targets.
        "os" | "tty" | "net" | "dgram" | "child_process" | "cluster" | "worker_threads" | "perf_hooks" | "v8" | "vm" | "zlib" => {
            rsquickjs::IntoJs::into_js(Object::new(ctx.clone())?, ctx)
        }
        other => Err(Exception::throw_message(ctx, &format!("Cannot find module '{other}'"))),
    }
}

/// `{exports, module}` as spec.md §4.5 "Execute" documents the return
/// value. Both handles are [`Persistent`] because they're read back
/// outside the `Ctx::with` scope that produced them.
pub struct ExecuteResult {
    pub exports: Persistent<Value<'static>>,
    pub module: Persistent<Object<'static>>,
}

/// Ties together a `rsquickjs` runtime/context, the module loader, and the
/// REPL's generator-trick binding persistence. This is the native
/// equivalent of `createRuntime()`'s returned handle.
pub struct Runtime {
    pub qjs_runtime: QjsRuntime,
    pub context: Context,
    pub vsys: Arc<Vsys>,
}

impl Runtime {
    pub fn new(vsys: Arc<Vsys>, opts: RuntimeOptions) -> Result<Self> {
        let qjs_runtime = QjsRuntime::new()?;
        let context = Context::full(&qjs_runtime)?;

        context.with(|ctx| -> Result<()> {
            crate::init(&ctx, vsys.clone(), opts.log_type)?;
            init_process(&ctx, &opts)?;
            install_polyfills(&ctx)?;
            loader::init(&ctx, &opts.cwd)?;
            Ok(())
        })?;

        Ok(Self { qjs_runtime, context, vsys })
    }

    /// Evaluates `code` as a CJS module rooted at `filename`, the way the
    /// entry script Node invokes with `node file.js` is itself wrapped.
    /// Returns `module.exports` and `module` itself, each kept alive past
    /// this call via [`Persistent`] so a caller can restore them against
    /// any `Ctx` drawn from the same runtime.
    pub fn execute(&self, code: &str, filename: &str) -> Result<ExecuteResult> {
        // Write the untransformed source into the VFS under `filename` first,
        // so a child `require`/`import` resolved relative to this entry, or a
        // debugger inspecting it, can see it (spec.md §4.5).
        if let Some(dirname) = filename.rfind('/').map(|i| &filename[..i]) {
            if !dirname.is_empty() {
                let _ = self.vsys.vfs.mkdir(dirname, true);
            }
        }
        if let Err(e) = self.vsys.vfs.write(filename, code.as_bytes()) {
            tracing::warn!("failed to write {filename} into the VFS: {e}");
        }

        self.context.with(|ctx| -> Result<ExecuteResult> {
            let transformed = crate::transform::transform(filename, code);
            let wrapped = format!(
                "(function(exports, require, module, __filename, __dirname, process, console, import_meta, __dynamicImport) {{\n{transformed}\n}})",
            );
            let wrapper: rsquickjs::Function = ctx.eval(wrapped.into_bytes()).catch(&ctx).map_err(|e| Exception::throw_message(&ctx, &format!("{e:?}")))?;

            let module_obj = Object::new(ctx.clone())?;
            let exports_obj = Object::new(ctx.clone())?;
            module_obj.set("exports", exports_obj.clone())?;
            let dirname = filename.rfind('/').map(|i| filename[..i].to_string()).unwrap_or_else(|| ".".to_string());
            let require_fn = loader::make_require_fn(&ctx, filename.to_string())?;
            let dynamic_import_fn = loader::make_dynamic_import_fn(&ctx, filename.to_string())?;
            let process: Value = ctx.globals().get("process").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
            let console: Value = ctx.globals().get("console").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
            let import_meta = Object::new(ctx.clone())?;
            import_meta.set("url", format!("file://{filename}"))?;

            wrapper
                .call::<_, ()>((exports_obj.clone(), require_fn, module_obj.clone(), filename.to_string(), dirname, process, console, import_meta, dynamic_import_fn))
                .catch(&ctx)
                .map_err(|e| Exception::throw_message(&ctx, &format!("{e:?}")))?;

            // `module.exports` may have been replaced wholesale (`module.exports = ...`)
            // rather than mutated in place, so re-read it off `module_obj` instead of
            // reusing the original `exports_obj` handle.
            let final_exports: Value = module_obj.get("exports").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
            Ok(ExecuteResult {
                exports: Persistent::save(&ctx, final_exports),
                module: Persistent::save(&ctx, module_obj),
            })
        })
    }

    /// Reads, then executes, the file at `path` through the same module
    /// wrapper `require()` uses — `run_file` and `require(path)` differ
    /// only in that the former is not itself cached under its own path.
    pub fn run_file(&self, path: &str) -> Result<()> {
        let source = (self.vsys.module_loader.load)(&self.vsys.vfs, &self.vsys.fs, path).map_err(|e| rsquickjs::Error::new_loading_message(path, e.to_string()))?;
        let code = String::from_utf8_lossy(&source.source).into_owned();
        self.context.with(|ctx| -> Result<()> {
            self.execute_in(&ctx, &code, path)?;
            Ok(())
        })
    }

    fn execute_in(&self, ctx: &Ctx<'_>, code: &str, filename: &str) -> Result<()> {
        let transformed = crate::transform::transform(filename, code);
        let wrapped = format!(
            "(function(exports, require, module, __filename, __dirname, process, console, import_meta, __dynamicImport) {{\n{transformed}\n}})",
        );
        let wrapper: rsquickjs::Function = ctx.eval(wrapped.into_bytes())?;
        let module_obj = Object::new(ctx.clone())?;
        let exports_obj = Object::new(ctx.clone())?;
        module_obj.set("exports", exports_obj.clone())?;
        let dirname = filename.rfind('/').map(|i| filename[..i].to_string()).unwrap_or_else(|| ".".to_string());
        let require_fn = loader::make_require_fn(ctx, filename.to_string())?;
        let dynamic_import_fn = loader::make_dynamic_import_fn(ctx, filename.to_string())?;
        let process: Value = ctx.globals().get("process").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
        let console: Value = ctx.globals().get("console").unwrap_or_else(|_| Value::new_undefined(ctx.clone()));
        let import_meta = Object::new(ctx.clone())?;
        import_meta.set("url", format!("file://{filename}"))?;
        wrapper.call::<_, ()>((exports_obj, require_fn, module_obj, filename.to_string(), dirname, process, console, import_meta, dynamic_import_fn))
    }

    /// Clears the module record cache. Subsequent `require()` calls
    /// re-read and re-evaluate from the VFS, the native analogue of
    /// deleting entries from `require.cache`.
    pub fn clear_cache(&self) -> Result<()> {
        self.context.with(|ctx| -> Result<()> {
            if let Some(cache) = ctx.userdata::<loader::ModuleCache<'_>>() {
                cache.clear();
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_sane_cwd() {
        let opts = RuntimeOptions::default();
        assert_eq!(opts.cwd, "/");
        assert_eq!(opts.argv[0], "node");
    }
}
