use std::sync::{Arc, RwLock};

use rsquickjs::{
    class::{Trace, Tracer},
    Ctx, Exception, JsLifetime, Result, Value,
};

use crate::event::{Emitter, EventList, Events};

#[rsquickjs::class]
#[derive(Clone)]
pub struct AbortSignal<'js> {
    events: Events<'js>,
    aborted: Arc<RwLock<Option<Value<'js>>>>,
}

unsafe impl<'js> JsLifetime<'js> for AbortSignal<'js> {
    type Changed<'to> = AbortSignal<'to>;
}

impl<'js> Trace<'js> for AbortSignal<'js> {
    fn trace<'a>(&self, tracer: Tracer<'a, 'js>) {
        self.trace_event_emitter(tracer);
        if let Some(reason) = self.aborted.read().unwrap().as_ref() {
            tracer.mark(reason);
        }
    }
}

impl<'js> Emitter<'js> for AbortSignal<'js> {
    fn get_event_list(&self) -> Events<'js> {
        self.events.clone()
    }
}

#[rsquickjs::methods(rename_all = "camelCase")]
impl<'js> AbortSignal<'js> {
    #[qjs(constructor)]
    pub fn new() -> Self {
        Self {
            #[allow(clippy::arc_with_non_send_sync)]
            events: Arc::new(RwLock::new(EventList::new())),
            aborted: Arc::new(RwLock::new(None)),
        }
    }

    #[qjs(get)]
    pub fn aborted(&self) -> bool {
        self.aborted.read().unwrap().is_some()
    }

    pub fn reason(&self) -> Option<Value<'js>> {
        self.aborted.read().unwrap().clone()
    }

    pub fn throw_if_aborted(&self, ctx: Ctx<'js>) -> Result<()> {
        if let Some(reason) = self.reason() {
            if let Some(s) = reason.as_string() {
                return Err(Exception::throw_message(&ctx, &s.to_string()?));
            }
            return Err(Exception::throw_message(&ctx, "The operation was aborted"));
        }
        Ok(())
    }
}

impl<'js> Default for AbortSignal<'js> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'js> AbortSignal<'js> {
    pub(crate) fn signal_abort(&self, ctx: &Ctx<'js>, reason: Value<'js>) -> Result<()> {
        *self.aborted.write().unwrap() = Some(reason);
        self.emit(ctx, "abort", rsquickjs::prelude::Rest(Vec::new()))
    }
}
