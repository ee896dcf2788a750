//! Caches the handful of built-in constructors/prototypes builtins reach
//! for repeatedly (`TypeError`, `Error`, `Promise`), so each one is looked
//! up from `globalThis` exactly once per context instead of once per call.

use rsquickjs::{Ctx, Function, JsLifetime, Result, UserDataGuard};

pub trait Primordial: Sized + 'static {
    fn new(ctx: &Ctx<'_>) -> Result<Self>;

    fn init(ctx: &Ctx<'_>) -> Result<()> {
        if ctx.userdata::<Self>().is_none() {
            let primordial = Self::new(ctx)?;
            ctx.store_userdata(primordial)?;
        }
        Ok(())
    }
}

#[derive(JsLifetime)]
pub struct BasePrimordials<'js> {
    pub constructor_type_error: Function<'js>,
    pub constructor_error: Function<'js>,
    pub constructor_range_error: Function<'js>,
    pub constructor_promise: Function<'js>,
}

impl<'js> Primordial for BasePrimordials<'js> {
    fn new(ctx: &Ctx<'js>) -> Result<Self> {
        let globals = ctx.globals();
        Ok(Self {
            constructor_type_error: globals.get("TypeError")?,
            constructor_error: globals.get("Error")?,
            constructor_range_error: globals.get("RangeError")?,
            constructor_promise: globals.get("Promise")?,
        })
    }
}

impl<'js> BasePrimordials<'js> {
    pub fn get(ctx: &Ctx<'js>) -> Result<UserDataGuard<'js, BasePrimordials<'js>>> {
        BasePrimordials::init(ctx)?;
        Ok(ctx
            .userdata::<BasePrimordials<'js>>()
            .expect("BasePrimordials::init just stored it"))
    }
}
