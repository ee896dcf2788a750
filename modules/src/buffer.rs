//! Node's `Buffer`: a resizable byte array with `Uint8Array` semantics plus
//! the encoding helpers (`hex`, `base64`, `base64url`, `utf8`) most builtins
//! in this crate hand bytes back to JS through.

use rsquickjs::class::{Trace, Tracer};
use rsquickjs::function::Opt;
use rsquickjs::prelude::Func;
use rsquickjs::{
    module::{Declarations, Exports, ModuleDef},
    Class, Ctx, Exception, FromJs, IntoJs, JsLifetime, Object, Result, TypedArray, Value,
};

use crate::utils::bytes::ObjectBytes;
use crate::utils::module::{export_default, ModuleInfo};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
const B64_STD: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const B64_URL: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0xf) as usize] as char);
    }
    out
}

fn decode_hex(s: &str) -> Vec<u8> {
    let digits: Vec<u8> = s
        .bytes()
        .filter_map(|c| match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        })
        .collect();
    digits.chunks(2).filter(|c| c.len() == 2).map(|c| (c[0] << 4) | c[1]).collect()
}

fn encode_base64(bytes: &[u8], alphabet: &[u8; 64], pad: bool) -> String {
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = *chunk.get(1).unwrap_or(&0) as u32;
        let b2 = *chunk.get(2).unwrap_or(&0) as u32;
        let n = (b0 << 16) | (b1 << 8) | b2;
        out.push(alphabet[((n >> 18) & 0x3f) as usize] as char);
        out.push(alphabet[((n >> 12) & 0x3f) as usize] as char);
        out.push(if chunk.len() > 1 {
            alphabet[((n >> 6) & 0x3f) as usize] as char
        } else if pad {
            '='
        } else {
            continue;
        });
        out.push(if chunk.len() > 2 {
            alphabet[(n & 0x3f) as usize] as char
        } else if pad {
            '='
        } else {
            continue;
        });
    }
    out
}

fn decode_base64(s: &str, alphabet: &[u8; 64]) -> Vec<u8> {
    let mut rev = [255u8; 256];
    for (i, c) in alphabet.iter().enumerate() {
        rev[*c as usize] = i as u8;
    }
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| *b != b'=')
        .filter_map(|b| {
            let v = rev[b as usize];
            if v == 255 {
                None
            } else {
                Some(v)
            }
        })
        .collect();
    let mut out = Vec::with_capacity(digits.len() * 3 / 4);
    for chunk in digits.chunks(4) {
        let n = chunk.iter().enumerate().fold(0u32, |acc, (i, d)| acc | ((*d as u32) << (18 - 6 * i)));
        out.push((n >> 16) as u8);
        if chunk.len() > 2 {
            out.push((n >> 8) as u8);
        }
        if chunk.len() > 3 {
            out.push(n as u8);
        }
    }
    out
}

/// Encode `bytes` in one of the Node `Buffer` encodings.
pub fn encode(bytes: &[u8], encoding: &str) -> Option<String> {
    match encoding {
        "hex" => Some(encode_hex(bytes)),
        "base64" => Some(encode_base64(bytes, B64_STD, true)),
        "base64url" => Some(encode_base64(bytes, B64_URL, false)),
        "utf8" | "utf-8" => Some(String::from_utf8_lossy(bytes).into_owned()),
        "latin1" | "binary" | "ascii" => Some(bytes.iter().map(|b| *b as char).collect()),
        _ => None,
    }
}

fn decode(s: &str, encoding: &str) -> Vec<u8> {
    match encoding {
        "hex" => decode_hex(s),
        "base64" => decode_base64(s, B64_STD),
        "base64url" => decode_base64(s, B64_URL),
        "latin1" | "binary" | "ascii" => s.chars().map(|c| c as u8).collect(),
        _ => s.as_bytes().to_vec(),
    }
}

#[derive(Clone)]
#[rsquickjs::class]
pub struct Buffer(pub Vec<u8>);

impl<'js> Trace<'js> for Buffer {
    fn trace<'a>(&self, _: Tracer<'a, 'js>) {}
}

unsafe impl<'js> JsLifetime<'js> for Buffer {
    type Changed<'to> = Buffer;
}

#[rsquickjs::methods]
impl Buffer {
    #[qjs(get)]
    pub fn length(&self) -> usize {
        self.0.len()
    }

    pub fn to_string<'js>(&self, ctx: Ctx<'js>, Opt(encoding): Opt<String>) -> Result<Value<'js>> {
        let encoding = encoding.unwrap_or_else(|| "utf8".to_string());
        let s = encode(&self.0, &encoding)
            .ok_or_else(|| Exception::throw_type(&ctx, &format!("unsupported encoding '{encoding}'")))?;
        Ok(rsquickjs::String::from_str(ctx, &s)?.into_value())
    }

    pub fn slice(&self, start: Opt<isize>, end: Opt<isize>) -> Buffer {
        let len = self.0.len() as isize;
        let clamp = |v: isize| v.rem_euclid(len.max(1)).min(len).max(0) as usize;
        let start = start.0.map(clamp).unwrap_or(0);
        let end = end.0.map(clamp).unwrap_or(self.0.len());
        Buffer(self.0.get(start..end.max(start)).unwrap_or(&[]).to_vec())
    }
}

impl<'js> IntoJs<'js> for Buffer {
    fn into_js(self, ctx: &Ctx<'js>) -> Result<Value<'js>> {
        Class::instance(ctx.clone(), self).map(|c| c.into_value())
    }
}

impl<'js> FromJs<'js> for Buffer {
    fn from_js(ctx: &Ctx<'js>, value: Value<'js>) -> Result<Self> {
        if let Ok(class) = Class::<Buffer>::from_value(value.clone()) {
            return Ok(class.borrow().clone());
        }
        let bytes = ObjectBytes::from(ctx, &value)?;
        Ok(Buffer(bytes.as_bytes(ctx)?.to_vec()))
    }
}

fn buffer_from<'js>(ctx: Ctx<'js>, value: Value<'js>, encoding: Opt<String>) -> Result<Buffer> {
    if let Some(s) = value.as_string() {
        let s = s.to_string()?;
        let encoding = encoding.0.unwrap_or_else(|| "utf8".to_string());
        return Ok(Buffer(decode(&s, &encoding)));
    }
    Buffer::from_js(&ctx, value)
}

fn buffer_alloc(size: usize, fill: Opt<u8>) -> Buffer {
    Buffer(vec![fill.0.unwrap_or(0); size])
}

fn buffer_concat(parts: Vec<Buffer>) -> Buffer {
    let mut out = Vec::new();
    for p in parts {
        out.extend_from_slice(&p.0);
    }
    Buffer(out)
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    Class::<Buffer>::define(&globals)?;

    let buffer_ctor = Object::new(ctx.clone())?;
    buffer_ctor.set("from", Func::from(buffer_from))?;
    buffer_ctor.set("alloc", Func::from(buffer_alloc))?;
    buffer_ctor.set("concat", Func::from(buffer_concat))?;
    buffer_ctor.set(
        "isBuffer",
        Func::from(|v: Value<'_>| Class::<Buffer>::from_value(v).is_ok()),
    )?;
    globals.set("Buffer", buffer_ctor)?;
    Ok(())
}

pub struct BufferModule;

impl ModuleDef for BufferModule {
    fn declare(declare: &Declarations) -> Result<()> {
        declare.declare("Buffer")?;
        declare.declare("default")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> Result<()> {
        export_default(ctx, exports, |default| {
            let buffer: Value = ctx.globals().get("Buffer")?;
            default.set("Buffer", buffer)?;
            Ok(())
        })
    }
}

impl From<BufferModule> for ModuleInfo<BufferModule> {
    fn from(val: BufferModule) -> Self {
        ModuleInfo {
            name: "buffer",
            module: val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let bytes = b"hello";
        let hex = encode_hex(bytes);
        assert_eq!(hex, "68656c6c6f");
        assert_eq!(decode_hex(&hex), bytes);
    }

    #[test]
    fn base64_round_trips() {
        let bytes = b"hello world";
        let encoded = encode_base64(bytes, B64_STD, true);
        assert_eq!(encoded, "aGVsbG8gd29ybGQ=");
        assert_eq!(decode_base64(&encoded, B64_STD), bytes);
    }

    #[test]
    fn base64url_has_no_padding() {
        let bytes = b"a";
        let encoded = encode_base64(bytes, B64_URL, false);
        assert!(!encoded.contains('='));
    }
}
