//! Finalization-registry plumbing shared by `async_hooks` and anything else
//! that needs to observe an object being garbage collected from JS land.

use rsquickjs::{Ctx, Result, Value};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FINALIZER_ID: AtomicU64 = AtomicU64::new(1);

/// Register `target` with `globalThis.asyncFinalizationRegistry` under a
/// freshly minted id, tagging `heldValue` so the hook callback can look the
/// id back up when the registry fires.
pub fn register_finalization_registry<'js>(
    ctx: &Ctx<'js>,
    target: Value<'js>,
    held_value: Value<'js>,
) -> Result<u64> {
    let id = NEXT_FINALIZER_ID.fetch_add(1, Ordering::Relaxed);

    let globals = ctx.globals();
    let registry: rsquickjs::Object = globals.get("asyncFinalizationRegistry")?;
    let register: rsquickjs::Function = registry.get("register")?;
    register.call::<_, ()>((target, held_value))?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_ids_are_monotonic() {
        let a = NEXT_FINALIZER_ID.fetch_add(1, Ordering::Relaxed);
        let b = NEXT_FINALIZER_ID.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);
    }
}
