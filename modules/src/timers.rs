//! `setTimeout`/`setInterval`/`setImmediate` and their `clear*` companions.
//! Callbacks run on the context's own async executor via
//! [`CtxExtension::spawn_exit_simple`], so they interleave with promise
//! jobs the same way Node's timer phase interleaves with microtasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rsquickjs::function::Rest;
use rsquickjs::prelude::Func;
use rsquickjs::{
    module::{Declarations, Exports, ModuleDef},
    Ctx, Function, Result, Value,
};

use crate::utils::ctx::CtxExtension;
use crate::utils::module::{export_default, ModuleInfo};

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

fn cancelled_flags(ctx: &Ctx<'_>) -> Arc<dashmap_lite::Table> {
    if let Some(ud) = ctx.userdata::<Arc<dashmap_lite::Table>>() {
        return (*ud).clone();
    }
    let table = Arc::new(dashmap_lite::Table::default());
    let _ = ctx.store_userdata(table.clone());
    table
}

/// A tiny id -> cancelled map; timers are not numerous enough in practice
/// to need a real concurrent map, just interior mutability behind a mutex.
mod dashmap_lite {
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct Table(Mutex<HashMap<u64, std::sync::Arc<std::sync::atomic::AtomicBool>>>);

    impl Table {
        pub fn register(&self, id: u64) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
            let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            self.0.lock().unwrap().insert(id, flag.clone());
            flag
        }

        pub fn cancel(&self, id: u64) {
            if let Some(flag) = self.0.lock().unwrap().get(&id) {
                flag.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }
}

fn schedule<'js>(
    ctx: Ctx<'js>,
    callback: Function<'js>,
    delay_ms: f64,
    args: Rest<Value<'js>>,
    repeat: bool,
) -> Result<u64> {
    let id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
    let table = cancelled_flags(&ctx);
    let cancelled = table.register(id);
    let delay = Duration::from_millis(delay_ms.max(0.0) as u64);
    let args: Vec<Value<'js>> = args.0;

    ctx.clone().spawn_exit_simple(async move {
        loop {
            tokio::time::sleep(delay).await;
            if cancelled.load(Ordering::Relaxed) {
                return Ok(());
            }
            callback.call::<_, ()>(args.clone())?;
            if !repeat {
                return Ok(());
            }
        }
    });

    Ok(id)
}

fn set_timeout<'js>(ctx: Ctx<'js>, callback: Function<'js>, delay: Option<f64>, args: Rest<Value<'js>>) -> Result<u64> {
    schedule(ctx, callback, delay.unwrap_or(0.0), args, false)
}

fn set_interval<'js>(ctx: Ctx<'js>, callback: Function<'js>, delay: Option<f64>, args: Rest<Value<'js>>) -> Result<u64> {
    schedule(ctx, callback, delay.unwrap_or(0.0), args, true)
}

fn set_immediate<'js>(ctx: Ctx<'js>, callback: Function<'js>, args: Rest<Value<'js>>) -> Result<u64> {
    schedule(ctx, callback, 0.0, args, false)
}

fn clear_timer(ctx: Ctx<'_>, id: u64) {
    cancelled_flags(&ctx).cancel(id);
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    globals.set("setTimeout", Func::from(set_timeout))?;
    globals.set("setInterval", Func::from(set_interval))?;
    globals.set("setImmediate", Func::from(set_immediate))?;
    globals.set("clearTimeout", Func::from(clear_timer))?;
    globals.set("clearInterval", Func::from(clear_timer))?;
    globals.set("clearImmediate", Func::from(clear_timer))?;
    Ok(())
}

pub struct TimersModule;

impl ModuleDef for TimersModule {
    fn declare(declare: &Declarations) -> Result<()> {
        declare.declare("setTimeout")?;
        declare.declare("setInterval")?;
        declare.declare("setImmediate")?;
        declare.declare("clearTimeout")?;
        declare.declare("clearInterval")?;
        declare.declare("clearImmediate")?;
        declare.declare("default")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> Result<()> {
        for name in [
            "setTimeout",
            "setInterval",
            "setImmediate",
            "clearTimeout",
            "clearInterval",
            "clearImmediate",
        ] {
            let value: Value = ctx.globals().get(name)?;
            exports.export(name, value)?;
        }
        export_default(ctx, exports, |default| {
            for name in [
                "setTimeout",
                "setInterval",
                "setImmediate",
                "clearTimeout",
                "clearInterval",
                "clearImmediate",
            ] {
                let value: Value = ctx.globals().get(name)?;
                default.set(name, value)?;
            }
            Ok(())
        })
    }
}

impl From<TimersModule> for ModuleInfo<TimersModule> {
    fn from(val: TimersModule) -> Self {
        ModuleInfo {
            name: "timers",
            module: val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_ids_are_monotonic() {
        let a = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        let b = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);
    }

    #[test]
    fn cancel_flips_registered_flag() {
        let table = dashmap_lite::Table::default();
        let flag = table.register(1);
        assert!(!flag.load(Ordering::Relaxed));
        table.cancel(1);
        assert!(flag.load(Ordering::Relaxed));
    }
}
