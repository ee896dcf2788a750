//! WHATWG `URL`/`URLSearchParams`, backed by the `url` crate's parser.

use rsquickjs::class::{Trace, Tracer};
use rsquickjs::function::Opt;
use rsquickjs::{
    module::{Declarations, Exports, ModuleDef},
    Class, Ctx, Exception, IntoJs, JsLifetime, Object, Result, Value,
};

use crate::utils::module::{export_default, ModuleInfo};

#[derive(Clone)]
#[rsquickjs::class(rename = "URL")]
pub struct Url {
    inner: url::Url,
}

impl<'js> Trace<'js> for Url {
    fn trace<'a>(&self, _: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for Url {
    type Changed<'to> = Url;
}

#[rsquickjs::methods]
impl Url {
    #[qjs(constructor)]
    pub fn new(ctx: Ctx<'_>, input: String, Opt(base): Opt<String>) -> Result<Self> {
        let parsed = match base {
            Some(base) => {
                let base = url::Url::parse(&base)
                    .map_err(|e| Exception::throw_type(&ctx, &format!("invalid base URL: {e}")))?;
                base.join(&input)
                    .map_err(|e| Exception::throw_type(&ctx, &format!("invalid URL: {e}")))?
            }
            None => {
                url::Url::parse(&input).map_err(|e| Exception::throw_type(&ctx, &format!("invalid URL: {e}")))?
            }
        };
        Ok(Url { inner: parsed })
    }

    #[qjs(get, rename = "href")]
    pub fn href(&self) -> String {
        self.inner.to_string()
    }

    #[qjs(get)]
    pub fn protocol(&self) -> String {
        format!("{}:", self.inner.scheme())
    }

    #[qjs(get)]
    pub fn host(&self) -> String {
        self.inner.host_str().unwrap_or("").to_string()
    }

    #[qjs(get)]
    pub fn hostname(&self) -> String {
        self.inner.host_str().unwrap_or("").to_string()
    }

    #[qjs(get)]
    pub fn port(&self) -> String {
        self.inner.port().map(|p| p.to_string()).unwrap_or_default()
    }

    #[qjs(get)]
    pub fn pathname(&self) -> String {
        self.inner.path().to_string()
    }

    #[qjs(get)]
    pub fn search(&self) -> String {
        self.inner.query().map(|q| format!("?{q}")).unwrap_or_default()
    }

    #[qjs(get)]
    pub fn hash(&self) -> String {
        self.inner.fragment().map(|f| format!("#{f}")).unwrap_or_default()
    }

    #[qjs(get)]
    pub fn origin(&self) -> String {
        self.inner.origin().ascii_serialization()
    }

    #[qjs(rename = "toString")]
    pub fn to_string_js(&self) -> String {
        self.inner.to_string()
    }
}

impl<'js> IntoJs<'js> for Url {
    fn into_js(self, ctx: &Ctx<'js>) -> Result<Value<'js>> {
        Class::instance(ctx.clone(), self).map(|c| c.into_value())
    }
}

fn build_search_params(ctx: &Ctx<'_>, query: &str) -> Result<Object<'_>> {
    let params = Object::new(ctx.clone())?;
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        params.set(k.into_owned(), v.into_owned())?;
    }
    Ok(params)
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    Class::<Url>::define(&globals)?;
    globals.set(
        "URLSearchParams",
        rsquickjs::Function::new(ctx.clone(), {
            let ctx = ctx.clone();
            move |query: Opt<String>| -> Result<Object<'_>> { build_search_params(&ctx, &query.0.unwrap_or_default()) }
        }),
    )?;
    Ok(())
}

pub struct UrlModule;

impl ModuleDef for UrlModule {
    fn declare(declare: &Declarations) -> Result<()> {
        declare.declare("URL")?;
        declare.declare("URLSearchParams")?;
        declare.declare("default")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> Result<()> {
        for name in ["URL", "URLSearchParams"] {
            let value: Value = ctx.globals().get(name)?;
            exports.export(name, value)?;
        }
        export_default(ctx, exports, |default| {
            for name in ["URL", "URLSearchParams"] {
                let value: Value = ctx.globals().get(name)?;
                default.set(name, value)?;
            }
            Ok(())
        })
    }
}

impl From<UrlModule> for ModuleInfo<UrlModule> {
    fn from(val: UrlModule) -> Self {
        ModuleInfo {
            name: "url",
            module: val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_components() {
        let parsed = url::Url::parse("https://example.com:8080/path?a=1#frag").unwrap();
        assert_eq!(parsed.host_str(), Some("example.com"));
        assert_eq!(parsed.port(), Some(8080));
        assert_eq!(parsed.path(), "/path");
        assert_eq!(parsed.query(), Some("a=1"));
        assert_eq!(parsed.fragment(), Some("frag"));
    }
}
