//! Bridges the host-side `sprout_vfs::Permissions`/`Vsys` into the JS
//! context as userdata, so every builtin (`fs`, `fetch`, `crypto`, ...)
//! can ask the same question the host asked when it built the runtime:
//! "is this path/host/env var allowed?"

use std::sync::Arc;

use rsquickjs::{Ctx, Result};
use sprout_vfs::Vsys;

/// Store the runtime's `Vsys` as QuickJS userdata, replacing whatever was
/// stored previously. Builtins retrieve it with [`get_vsys`].
pub fn init(ctx: Ctx<'_>, vsys: Arc<Vsys>) -> Result<()> {
    ctx.store_userdata(vsys)?;
    Ok(())
}

/// Retrieve the `Vsys` stored by [`init`], if any.
pub fn get_vsys<'js>(ctx: &Ctx<'js>) -> Option<Arc<Vsys>> {
    ctx.userdata::<Arc<Vsys>>().map(|ud| (*ud).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_vfs::Vsys;

    #[test]
    fn allow_all_vsys_allows_everything() {
        let vsys = Vsys::default();
        assert!(vsys.permissions().check_net("example.com"));
    }

    #[test]
    fn sandboxed_vsys_denies_everything() {
        let vsys = Vsys::sandboxed();
        assert!(!vsys.permissions().check_net("example.com"));
    }
}
