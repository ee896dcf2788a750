//! `fetch()` and a minimal `Request`/`Response`/`Headers` surface.
//!
//! In-browser, every `fetch` call would actually be intercepted by the
//! Service Worker bridge (see `sprout-bridge`) before it ever reaches a
//! real network; from the module's point of view that's just "some HTTP
//! client answers this request". Natively there is no Service Worker, so
//! this talks to `reqwest` directly, gated by the same
//! `Vsys::permissions().check_net` every other network-touching builtin
//! goes through.

use std::sync::OnceLock;
use std::time::Duration;

use rsquickjs::class::{Trace, Tracer};
use rsquickjs::function::Opt;
use rsquickjs::prelude::{Async, Func};
use rsquickjs::{Class, Ctx, Exception, IntoJs, JsLifetime, Object, Result, Value};

use crate::permissions::get_vsys;
use crate::utils::object::ObjectExt;

fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("fetch client builds with default TLS backend")
    })
}

#[derive(Clone)]
#[rsquickjs::class]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl<'js> Trace<'js> for Headers {
    fn trace<'a>(&self, _: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for Headers {
    type Changed<'to> = Headers;
}

#[rsquickjs::methods]
impl Headers {
    #[qjs(constructor)]
    pub fn new(ctx: Ctx<'_>, Opt(init): Opt<Object<'_>>) -> Result<Self> {
        let mut entries = Vec::new();
        if let Some(init) = init {
            for key in init.keys::<String>() {
                let key = key?;
                let value: String = init.get(&key)?;
                entries.push((key.to_lowercase(), value));
            }
        }
        let _ = ctx;
        Ok(Headers { entries })
    }

    pub fn get(&self, name: String) -> Option<String> {
        let name = name.to_lowercase();
        self.entries.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone())
    }

    pub fn has(&self, name: String) -> bool {
        let name = name.to_lowercase();
        self.entries.iter().any(|(k, _)| *k == name)
    }

    pub fn set(&mut self, name: String, value: String) {
        let name = name.to_lowercase();
        self.entries.retain(|(k, _)| *k != name);
        self.entries.push((name, value));
    }
}

impl<'js> IntoJs<'js> for Headers {
    fn into_js(self, ctx: &Ctx<'js>) -> Result<Value<'js>> {
        Class::instance(ctx.clone(), self).map(|c| c.into_value())
    }
}

#[derive(Clone)]
#[rsquickjs::class]
pub struct Response {
    status: u16,
    url: String,
    body: Vec<u8>,
    headers: Headers,
}

impl<'js> Trace<'js> for Response {
    fn trace<'a>(&self, _: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for Response {
    type Changed<'to> = Response;
}

#[rsquickjs::methods]
impl Response {
    #[qjs(get)]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[qjs(get)]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[qjs(get)]
    pub fn url(&self) -> String {
        self.url.clone()
    }

    #[qjs(get)]
    pub fn headers(&self) -> Headers {
        self.headers.clone()
    }

    pub async fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub async fn json<'js>(&self, ctx: Ctx<'js>) -> Result<Value<'js>> {
        let text = String::from_utf8_lossy(&self.body).into_owned();
        let json_global: Object = ctx.globals().get("JSON")?;
        let parse: rsquickjs::Function = json_global.get("parse")?;
        parse.call((text,))
    }

    pub async fn array_buffer<'js>(&self, ctx: Ctx<'js>) -> Result<rsquickjs::ArrayBuffer<'js>> {
        rsquickjs::ArrayBuffer::new(ctx, self.body.clone())
    }
}

impl<'js> IntoJs<'js> for Response {
    fn into_js(self, ctx: &Ctx<'js>) -> Result<Value<'js>> {
        Class::instance(ctx.clone(), self).map(|c| c.into_value())
    }
}

async fn do_fetch(url: String, init: Option<Object<'_>>) -> reqwest::Result<(u16, String, Vec<u8>, Vec<(String, String)>)> {
    let method = init
        .as_ref()
        .and_then(|o| o.get_optional::<_, String>("method").ok().flatten())
        .unwrap_or_else(|| "GET".to_string());
    let body: Option<String> = init
        .as_ref()
        .and_then(|o| o.get_optional::<_, String>("body").ok().flatten());

    let mut req = client().request(method.parse().unwrap_or(reqwest::Method::GET), &url);
    if let Some(headers) = init.as_ref().and_then(|o| o.get_optional::<_, Object>("headers").ok().flatten()) {
        for key in headers.keys::<String>() {
            let key = key?;
            if let Ok(value) = headers.get::<_, String>(&key) {
                req = req.header(key, value);
            }
        }
    }
    if let Some(body) = body {
        req = req.body(body);
    }

    let resp = req.send().await?;
    let status = resp.status().as_u16();
    let final_url = resp.url().to_string();
    let headers = resp
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = resp.bytes().await?.to_vec();
    Ok((status, final_url, body, headers))
}

async fn fetch<'js>(ctx: Ctx<'js>, input: String, Opt(init): Opt<Object<'js>>) -> Result<Response> {
    let vsys = get_vsys(&ctx).ok_or_else(|| Exception::throw_message(&ctx, "Vsys not initialized"))?;
    let host = url::Url::parse(&input)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    if !vsys.permissions().check_net(&host) {
        return Err(Exception::throw_message(&ctx, &format!("Permission denied. Cannot fetch {input}")));
    }

    let (status, url, body, headers) = do_fetch(input, init)
        .await
        .map_err(|e| Exception::throw_message(&ctx, &format!("fetch failed: {e}")))?;

    Ok(Response {
        status,
        url,
        body,
        headers: Headers { entries: headers },
    })
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    Class::<Headers>::define(&globals)?;
    Class::<Response>::define(&globals)?;
    globals.set("fetch", Func::from(Async(fetch)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers { entries: Vec::new() };
        headers.set("Content-Type".to_string(), "application/json".to_string());
        assert_eq!(headers.get("content-type".to_string()), Some("application/json".to_string()));
        assert!(headers.has("CONTENT-TYPE".to_string()));
    }
}
