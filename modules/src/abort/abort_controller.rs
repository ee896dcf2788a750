use rsquickjs::{function::Opt, Class, Ctx, Result, Value};

use super::AbortSignal;

#[rsquickjs::class]
pub struct AbortController<'js> {
    signal: Class<'js, AbortSignal<'js>>,
}

unsafe impl<'js> rsquickjs::JsLifetime<'js> for AbortController<'js> {
    type Changed<'to> = AbortController<'to>;
}

impl<'js> rsquickjs::class::Trace<'js> for AbortController<'js> {
    fn trace<'a>(&self, tracer: rsquickjs::class::Tracer<'a, 'js>) {
        tracer.mark(&self.signal);
    }
}

#[rsquickjs::methods]
impl<'js> AbortController<'js> {
    #[qjs(constructor)]
    pub fn new(ctx: Ctx<'js>) -> Result<Self> {
        Ok(Self {
            signal: Class::instance(ctx, AbortSignal::new())?,
        })
    }

    #[qjs(get)]
    pub fn signal(&self) -> Class<'js, AbortSignal<'js>> {
        self.signal.clone()
    }

    pub fn abort(&self, ctx: Ctx<'js>, reason: Opt<Value<'js>>) -> Result<()> {
        let reason = match reason.0 {
            Some(r) => r,
            None => rsquickjs::String::from_str(ctx.clone(), "AbortError")?.into_value(),
        };
        self.signal.borrow().signal_abort(&ctx, reason)
    }
}
