//! Accepts the handful of shapes Node APIs treat interchangeably as "some
//! bytes" (`string`, `Buffer`, `ArrayBuffer`, typed array) and normalizes
//! them to a `Vec<u8>`/`&[u8]`, the way `Buffer.from`/hash `update()`/`fs`
//! write calls do in real Node.

use rsquickjs::{ArrayBuffer, Ctx, FromJs, Result, TypedArray, Value};

pub enum ObjectBytes<'js> {
    Bytes(Vec<u8>),
    Value(Value<'js>),
}

impl<'js> ObjectBytes<'js> {
    pub fn from(ctx: &Ctx<'js>, value: &Value<'js>) -> Result<Self> {
        if let Some(s) = value.as_string() {
            return Ok(Self::Bytes(s.to_string()?.into_bytes()));
        }
        if let Ok(array_buffer) = ArrayBuffer::from_value(value.clone()) {
            if let Some(bytes) = array_buffer.as_slice() {
                return Ok(Self::Bytes(bytes.to_vec()));
            }
        }
        if let Ok(typed) = TypedArray::<u8>::from_value(value.clone()) {
            if let Some(bytes) = typed.as_slice() {
                return Ok(Self::Bytes(bytes.to_vec()));
            }
        }
        let _ = ctx;
        Ok(Self::Value(value.clone()))
    }

    pub fn as_bytes(&self, ctx: &Ctx<'js>) -> Result<&[u8]> {
        match self {
            Self::Bytes(b) => Ok(b.as_slice()),
            Self::Value(_) => Err(rsquickjs::Exception::throw_type(
                ctx,
                "expected a string, Buffer, or typed array",
            )),
        }
    }
}

impl<'js> FromJs<'js> for ObjectBytes<'js> {
    fn from_js(ctx: &Ctx<'js>, value: Value<'js>) -> Result<Self> {
        Self::from(ctx, &value)
    }
}

pub fn bytes_to_typed_array<'js>(ctx: Ctx<'js>, bytes: &[u8]) -> Result<Value<'js>> {
    Ok(TypedArray::<u8>::new(ctx, bytes.to_vec())?.into_value())
}
