//! Node-compatible `EventEmitter` plus the DOM-flavored `EventTarget`/
//! `Event` pair that `AbortSignal` and friends build on.

use std::sync::{Arc, RwLock};

use rsquickjs::{
    class::{JsClass, Trace, Tracer},
    module::{Declarations, Exports, ModuleDef},
    prelude::{Func, Rest},
    Class, Ctx, Function, Object, Result, Value,
};

use crate::utils::module::{export_default, ModuleInfo};

mod event_target;
pub use event_target::EventTarget;

/// `(event name, listener)` pairs in registration order. A plain `Vec`
/// rather than a `HashMap<String, Vec<_>>` keeps `on("a")`/`on("a")`
/// firing in the order they were registered, across event names too,
/// matching Node's documented ordering guarantee for a single name.
pub type EventList<'js> = Vec<(String, Function<'js>, bool)>;
pub type Events<'js> = Arc<RwLock<EventList<'js>>>;

/// Shared behavior for anything that can `on`/`once`/`off`/`emit`.
/// Implemented by both `EventTarget` (DOM-style `addEventListener`) and
/// the plain Node `EventEmitter` below.
pub trait Emitter<'js>: JsClass<'js> {
    fn get_event_list(&self) -> Events<'js>;

    fn trace_event_emitter<'a>(&self, tracer: Tracer<'a, 'js>) {
        for (_, listener, _) in self.get_event_list().read().unwrap().iter() {
            tracer.mark(listener);
        }
    }

    fn on(&self, name: String, listener: Function<'js>) {
        self.get_event_list().write().unwrap().push((name, listener, false));
    }

    fn once(&self, name: String, listener: Function<'js>) {
        self.get_event_list().write().unwrap().push((name, listener, true));
    }

    fn off(&self, name: &str) {
        self.get_event_list().write().unwrap().retain(|(n, _, _)| n != name);
    }

    fn emit(&self, ctx: &Ctx<'js>, name: &str, args: Rest<Value<'js>>) -> Result<()> {
        let mut list = self.get_event_list().write().unwrap();
        let mut fired_once = Vec::new();
        for (idx, (event_name, listener, once)) in list.iter().enumerate() {
            if event_name == name {
                listener.call::<_, ()>(args.0.clone())?;
                if *once {
                    fired_once.push(idx);
                }
            }
        }
        for idx in fired_once.into_iter().rev() {
            list.remove(idx);
        }
        let _ = ctx;
        Ok(())
    }

    fn add_event_emitter_prototype(ctx: &Ctx<'js>) -> Result<()>
    where
        Self: Sized,
    {
        let proto = Class::<Self>::prototype(ctx)?
            .expect("EventEmitter-like class must be defined before adding its prototype");
        proto.set("on", Func::from(|this: rsquickjs::prelude::This<Class<Self>>, name: String, f: Function<'js>| {
            this.0.borrow().on(name, f);
        }))?;
        proto.set("once", Func::from(|this: rsquickjs::prelude::This<Class<Self>>, name: String, f: Function<'js>| {
            this.0.borrow().once(name, f);
        }))?;
        proto.set("off", Func::from(|this: rsquickjs::prelude::This<Class<Self>>, name: String| {
            this.0.borrow().off(&name);
        }))?;
        proto.set(
            "emit",
            Func::from(
                |ctx: Ctx<'js>, this: rsquickjs::prelude::This<Class<Self>>, name: String, args: Rest<Value<'js>>| {
                    this.0.borrow().emit(&ctx, &name, args)
                },
            ),
        )?;
        Ok(())
    }

    fn add_event_target_prototype(ctx: &Ctx<'js>) -> Result<()>
    where
        Self: Sized,
    {
        let proto = Class::<Self>::prototype(ctx)?
            .expect("EventTarget-like class must be defined before adding its prototype");
        proto.set(
            "addEventListener",
            Func::from(|this: rsquickjs::prelude::This<Class<Self>>, name: String, f: Function<'js>| {
                this.0.borrow().on(name, f);
            }),
        )?;
        proto.set(
            "removeEventListener",
            Func::from(|this: rsquickjs::prelude::This<Class<Self>>, name: String| {
                this.0.borrow().off(&name);
            }),
        )?;
        proto.set(
            "dispatchEvent",
            Func::from(
                |ctx: Ctx<'js>, this: rsquickjs::prelude::This<Class<Self>>, event: Object<'js>| -> Result<()> {
                    let name: String = event.get("type")?;
                    this.0.borrow().emit(&ctx, &name, Rest(vec![event.into_value()]))
                },
            ),
        )?;
        Ok(())
    }
}

#[rsquickjs::class]
#[derive(Clone)]
pub struct EventEmitter<'js> {
    events: Events<'js>,
}

unsafe impl<'js> rsquickjs::JsLifetime<'js> for EventEmitter<'js> {
    type Changed<'to> = EventEmitter<'to>;
}

impl<'js> Trace<'js> for EventEmitter<'js> {
    fn trace<'a>(&self, tracer: Tracer<'a, 'js>) {
        self.trace_event_emitter(tracer);
    }
}

impl<'js> Emitter<'js> for EventEmitter<'js> {
    fn get_event_list(&self) -> Events<'js> {
        self.events.clone()
    }
}

#[rsquickjs::methods]
impl<'js> EventEmitter<'js> {
    #[qjs(constructor)]
    pub fn new() -> Self {
        Self {
            #[allow(clippy::arc_with_non_send_sync)]
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<'js> Default for EventEmitter<'js> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    Class::<EventEmitter>::define(&globals)?;
    EventEmitter::add_event_emitter_prototype(ctx)?;
    Class::<EventTarget>::define(&globals)?;
    EventTarget::add_event_emitter_prototype(ctx)?;
    EventTarget::add_event_target_prototype(ctx)?;
    Ok(())
}

pub struct EventsModule;

impl ModuleDef for EventsModule {
    fn declare(declare: &Declarations) -> Result<()> {
        declare.declare("EventEmitter")?;
        declare.declare("default")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> Result<()> {
        export_default(ctx, exports, |default| {
            let ctor: Function = ctx.globals().get("EventEmitter")?;
            default.set("EventEmitter", ctor)?;
            Ok(())
        })?;
        exports.export("EventEmitter", ctx.globals().get::<_, Function>("EventEmitter")?)?;
        Ok(())
    }
}
