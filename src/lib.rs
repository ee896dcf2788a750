//! `createRuntime` (spec.md §6 "Runtime API surface"): the one entry point
//! every embedder (a dev-server, a CLI, a demo page) goes through to get a
//! running module loader/evaluator over a given VFS. Everything else in
//! this workspace — [`sprout_modules::runtime::Runtime`], [`sprout_pm`],
//! [`sprout_bridge`] — is usable standalone; this crate just wires them
//! into the single constructor spec.md names.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

pub use sprout_bridge as bridge;
pub use sprout_modules as modules;
pub use sprout_pm as pm;
pub use sprout_repl as repl;
pub use sprout_vfs as vfs;

use sprout_modules::runtime::{ExecuteResult, Runtime, RuntimeOptions};
use sprout_modules::console::LogType;
use sprout_vfs::{Permissions, Vfs, Vsys};

/// `createRuntime(vfs, options)`'s options bag (spec.md §6). `sandbox` and
/// `dangerously_allow_same_origin` both default to `false`; at least one
/// must be set or construction is refused (see [`create_runtime`]).
#[derive(Debug, Clone, Default)]
pub struct CreateRuntimeOptions {
    /// Runs with deny-by-default permissions (sprout_vfs's sandboxed
    /// posture): no real network, no ambient filesystem beyond the VFS.
    pub sandbox: bool,
    /// Explicit escape hatch for hosts that understand the same-origin
    /// risk and want the runtime to run with open permissions anyway.
    pub dangerously_allow_same_origin: bool,
    /// Requests worker-thread isolation. This native build has no OS
    /// worker-thread model to hand off to, so the runtime still executes
    /// in-process; the flag is recorded and logged rather than silently
    /// ignored (see DESIGN.md's Open Question resolution).
    pub use_worker: bool,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
    /// When set, console output is captured via `tracing` events instead
    /// of written straight to stdout/stderr, the native analogue of
    /// `onConsole` — a host wires its own subscriber to receive it.
    pub on_console: bool,
}

#[derive(Debug, Error)]
pub enum CreateRuntimeError {
    /// Mandatory per spec.md §6: "Refusing to execute without either
    /// `sandbox` or `dangerouslyAllowSameOrigin` is a mandatory behavior
    /// and surfaces with an explanatory error."
    #[error("refusing to create a runtime without either `sandbox: true` or `dangerously_allow_same_origin: true`")]
    NoIsolationRequested,
    #[error(transparent)]
    Js(#[from] rsquickjs::Error),
}

/// The object `createRuntime` returns: `execute`, `runFile`, `clearCache`,
/// plus `getVFS`/`terminate` (spec.md §6).
pub struct RuntimeHandle {
    runtime: Runtime,
    vsys: Arc<Vsys>,
}

impl RuntimeHandle {
    pub fn execute(&self, code: &str, filename: &str) -> rsquickjs::Result<ExecuteResult> {
        self.runtime.execute(code, filename)
    }

    pub fn run_file(&self, path: &str) -> rsquickjs::Result<()> {
        self.runtime.run_file(path)
    }

    pub fn clear_cache(&self) -> rsquickjs::Result<()> {
        self.runtime.clear_cache()
    }

    /// `getVFS()`: the VFS backing this runtime.
    pub fn vfs(&self) -> &Vfs {
        &self.vsys.vfs
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// `terminate()`: no OS thread/process backs a native handle, so this
    /// is a cooperative signal rather than a forced kill. Hosts that set
    /// `use_worker` should stop issuing new work after calling it.
    pub fn terminate(&self) {
        tracing::debug!("runtime terminate() requested; no OS-level worker to kill, caller should stop issuing work");
    }
}

/// `createRuntime(vfs, options)` (spec.md §6).
#[tracing::instrument(skip(vfs, opts))]
pub fn create_runtime(vfs: Vfs, opts: CreateRuntimeOptions) -> Result<RuntimeHandle, CreateRuntimeError> {
    if !opts.sandbox && !opts.dangerously_allow_same_origin {
        return Err(CreateRuntimeError::NoIsolationRequested);
    }
    if opts.use_worker {
        tracing::warn!("useWorker requested; this build runs the runtime in-process with no OS-level worker isolation");
    }

    let permissions = if opts.sandbox { Permissions::default() } else { Permissions::allow_all() };
    let vsys = Arc::new(Vsys::builder().vfs(vfs).permissions(permissions).build());

    let runtime_opts = RuntimeOptions {
        cwd: opts.cwd.unwrap_or_else(|| "/".to_string()),
        env: opts.env,
        log_type: if opts.on_console { LogType::Trace } else { LogType::Stdio },
        ..RuntimeOptions::default()
    };
    let runtime = Runtime::new(vsys.clone(), runtime_opts)?;
    Ok(RuntimeHandle { runtime, vsys })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_without_sandbox_or_dangerously_allow_same_origin() {
        let err = create_runtime(Vfs::new(), CreateRuntimeOptions::default()).unwrap_err();
        assert!(matches!(err, CreateRuntimeError::NoIsolationRequested));
    }

    #[test]
    fn sandbox_true_is_sufficient() {
        let opts = CreateRuntimeOptions { sandbox: true, ..Default::default() };
        assert!(create_runtime(Vfs::new(), opts).is_ok());
    }

    #[test]
    fn dangerously_allow_same_origin_is_sufficient() {
        let opts = CreateRuntimeOptions { dangerously_allow_same_origin: true, ..Default::default() };
        assert!(create_runtime(Vfs::new(), opts).is_ok());
    }

    #[test]
    fn execute_returns_exports() {
        let opts = CreateRuntimeOptions { sandbox: true, ..Default::default() };
        let handle = create_runtime(Vfs::new(), opts).unwrap();
        let result = handle.execute("module.exports = 42;", "/index.js").unwrap();
        let is_module_like = handle.runtime().context.with(|ctx| -> bool { result.module.clone().restore(&ctx).is_ok() });
        assert!(is_module_like);
    }
}
