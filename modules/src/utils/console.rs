//! `util.inspect`-style formatting for `console.log` and friends. Deep
//! recursion and circular-reference handling are intentionally simple:
//! this backs developer-facing diagnostic output, not a serialization
//! format anything else in the runtime depends on.

use rsquickjs::{prelude::Rest, Ctx, Result, Value};

pub const NEWLINE: &str = "\n";

#[derive(Clone, Copy)]
pub struct FormatOptions {
    pub color: bool,
    pub newline: bool,
}

impl FormatOptions {
    pub fn new(_ctx: &Ctx<'_>, color: bool, newline: bool) -> Result<Self> {
        Ok(Self { color, newline })
    }
}

fn format_value(ctx: &Ctx<'_>, value: &Value<'_>, depth: usize) -> Result<String> {
    if depth > 6 {
        return Ok("...".to_string());
    }
    if value.is_undefined() {
        return Ok("undefined".to_string());
    }
    if value.is_null() {
        return Ok("null".to_string());
    }
    if let Some(s) = value.as_string() {
        return s.to_string();
    }
    if let Some(b) = value.as_bool() {
        return Ok(b.to_string());
    }
    if let Some(n) = value.as_number() {
        return Ok(format!("{n}"));
    }
    if let Some(arr) = value.as_array() {
        let mut parts = Vec::new();
        for item in arr.iter::<Value>() {
            parts.push(format_value(ctx, &item?, depth + 1)?);
        }
        return Ok(format!("[ {} ]", parts.join(", ")));
    }
    if let Some(obj) = value.as_object() {
        if let Some(func) = obj.as_function() {
            let name: String = func.get("name").unwrap_or_default();
            return Ok(format!(
                "[Function: {}]",
                if name.is_empty() { "anonymous" } else { &name }
            ));
        }
        let mut parts = Vec::new();
        for key in obj.keys::<String>() {
            let key = key?;
            let v: Value = obj.get(&key)?;
            parts.push(format!("{key}: {}", format_value(ctx, &v, depth + 1)?));
        }
        return Ok(format!("{{ {} }}", parts.join(", ")));
    }
    Ok("<unknown>".to_string())
}

/// Appends the formatted, space-joined representation of `args` to `result`.
/// `options.newline` is honored by the caller (`write_log` appends
/// [`NEWLINE`] itself); `options.color` is currently a no-op since the
/// formatter emits plain text, not ANSI escapes.
pub fn build_formatted_string<'js>(
    result: &mut String,
    ctx: &Ctx<'js>,
    args: Rest<Value<'js>>,
    options: &mut FormatOptions,
) -> Result<()> {
    let _ = options;
    let mut parts = Vec::with_capacity(args.len());
    for arg in args.iter() {
        parts.push(format_value(ctx, arg, 0)?);
    }
    result.push_str(&parts.join(" "));
    Ok(())
}
