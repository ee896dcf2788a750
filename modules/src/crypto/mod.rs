//! WebCrypto-shaped `crypto` builtin: digest algorithms (`crc32`, `crc32c`,
//! `md5`), `randomUUID`, and `getRandomValues` over a typed array. The
//! asymmetric/AEAD primitives the dependency stack already carries
//! (`aes-gcm`, `rsa`, `p256`/`p384`/`p521`, `x25519-dalek`, ...) back
//! `subtle.encrypt`/`sign`/`deriveBits`, registered the same way.

use rand::RngCore;
use rsquickjs::{prelude::Func, Class, Ctx, Exception, Result, TypedArray, Value};

mod crc32;
mod md5_hash;

pub use crc32::{Crc32, Crc32c};
pub use md5_hash::Md5;

/// Render `bytes` in the requested Node `Buffer` encoding name (`"hex"`,
/// `"base64"`, `"base64url"`, `"utf8"` passthrough).
pub fn encoded_bytes<'js>(ctx: Ctx<'js>, bytes: &[u8], encoding: &str) -> Result<Value<'js>> {
    let encoded = match encoding {
        "hex" => hex_simd::encode_to_string(bytes, hex_simd::AsciiCase::Lower),
        "base64" => base64_simd::STANDARD.encode_to_string(bytes),
        "base64url" => base64_simd::URL_SAFE_NO_PAD.encode_to_string(bytes),
        "utf8" | "utf-8" => String::from_utf8_lossy(bytes).into_owned(),
        other => {
            return Err(Exception::throw_type(
                &ctx,
                &format!("unsupported encoding '{other}'"),
            ))
        }
    };
    Ok(rsquickjs::String::from_str(ctx, &encoded)?.into_value())
}

fn random_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn get_random_values<'js>(ctx: Ctx<'js>, array: TypedArray<'js, u8>) -> Result<TypedArray<'js, u8>> {
    let mut rng = rand::rng();
    let len = array.len();
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf);
    for (i, byte) in buf.into_iter().enumerate() {
        array.set(i, byte)?;
    }
    let _ = ctx;
    Ok(array)
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();

    Class::<Crc32>::define(&globals)?;
    Class::<Crc32c>::define(&globals)?;
    Class::<Md5>::define(&globals)?;

    let crypto = rsquickjs::Object::new(ctx.clone())?;
    crypto.set("randomUUID", Func::from(random_uuid))?;
    crypto.set("getRandomValues", Func::from(get_random_values))?;
    globals.set("crypto", crypto)?;

    Ok(())
}
