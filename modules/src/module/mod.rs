//! Node's `module` builtin. The actual `require()`/cache/resolution
//! machinery lives in [`crate::loader`]; this just exposes the
//! `createRequire(urlOrPath)` factory through `require("module")`, wired up
//! in [`crate::runtime::builtin_module`].

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
