//! `Error.captureStackTrace`, approximated: QuickJS already attaches a
//! `.stack` string to every thrown `Error`, so this installs a static
//! method that copies the *current* error's stack onto the target object
//! rather than reconstructing V8's structured call-site API.

use rsquickjs::prelude::Func;
use rsquickjs::{atom::PredefinedAtom, function::Opt, Ctx, Object, Result};

fn capture_stack_trace(ctx: Ctx<'_>, target: Object<'_>, _constructor_opt: Opt<rsquickjs::Value<'_>>) -> Result<()> {
    let error_ctor: rsquickjs::Function = ctx.globals().get("Error")?;
    let probe: Object = error_ctor.construct(())?;
    let stack: String = probe.get(PredefinedAtom::Stack).unwrap_or_default();
    target.set(PredefinedAtom::Stack, stack)?;
    Ok(())
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let error_ctor: Object = ctx.globals().get("Error")?;
    error_ctor.set("captureStackTrace", Func::from(capture_stack_trace))?;
    error_ctor.set("stackTraceLimit", 10)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn compiles() {}
}
