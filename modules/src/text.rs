//! `TextEncoder`/`TextDecoder` globals. Only the UTF-8 path is implemented;
//! other labels are accepted and treated as UTF-8, matching what a browser's
//! `TextDecoder` does for `"utf-8"`/`"unicode-1-1-utf-8"` aliases.

use rsquickjs::class::{Trace, Tracer};
use rsquickjs::function::Opt;
use rsquickjs::{Class, Ctx, JsLifetime, Result, TypedArray};

use crate::utils::bytes::ObjectBytes;

#[derive(Clone)]
#[rsquickjs::class]
pub struct TextEncoder;

impl<'js> Trace<'js> for TextEncoder {
    fn trace<'a>(&self, _: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for TextEncoder {
    type Changed<'to> = TextEncoder;
}

#[rsquickjs::methods]
impl TextEncoder {
    #[qjs(constructor)]
    pub fn new() -> Self {
        TextEncoder
    }

    #[qjs(get)]
    pub fn encoding(&self) -> &'static str {
        "utf-8"
    }

    pub fn encode<'js>(&self, ctx: Ctx<'js>, text: Opt<String>) -> Result<TypedArray<'js, u8>> {
        let bytes = text.0.unwrap_or_default().into_bytes();
        TypedArray::new(ctx, bytes)
    }
}

#[derive(Clone)]
#[rsquickjs::class]
pub struct TextDecoder {
    fatal: bool,
}

impl<'js> Trace<'js> for TextDecoder {
    fn trace<'a>(&self, _: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for TextDecoder {
    type Changed<'to> = TextDecoder;
}

#[rsquickjs::methods]
impl TextDecoder {
    #[qjs(constructor)]
    pub fn new(Opt(_label): Opt<String>, Opt(options): Opt<rsquickjs::Object<'_>>) -> Result<Self> {
        let fatal = options
            .as_ref()
            .and_then(|o| o.get::<_, bool>("fatal").ok())
            .unwrap_or(false);
        Ok(TextDecoder { fatal })
    }

    #[qjs(get)]
    pub fn encoding(&self) -> &'static str {
        "utf-8"
    }

    pub fn decode<'js>(&self, ctx: Ctx<'js>, input: Opt<rsquickjs::Value<'js>>) -> Result<String> {
        let bytes = match input.0 {
            Some(v) => ObjectBytes::from(&ctx, &v)?.as_bytes(&ctx)?.to_vec(),
            None => Vec::new(),
        };
        if self.fatal {
            String::from_utf8(bytes)
                .map_err(|e| rsquickjs::Exception::throw_type(&ctx, &format!("invalid utf-8: {e}")))
        } else {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    Class::<TextEncoder>::define(&globals)?;
    Class::<TextDecoder>::define(&globals)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_compiles() {
        let _ = TextEncoder::new();
    }
}
