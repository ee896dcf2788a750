//! Converts `Option`/`Result` into a thrown JS exception, the idiom every
//! builtin in this crate uses instead of `unwrap`/`expect`.

use rsquickjs::{Ctx, Exception, Result};
use std::fmt::Display;

pub trait ResultExt<T> {
    fn or_throw(self, ctx: &Ctx<'_>) -> Result<T>;
    fn or_throw_msg(self, ctx: &Ctx<'_>, msg: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Option<T> {
    fn or_throw(self, ctx: &Ctx<'_>) -> Result<T> {
        self.ok_or_else(|| Exception::throw_message(ctx, "value was None"))
    }

    fn or_throw_msg(self, ctx: &Ctx<'_>, msg: &str) -> Result<T> {
        self.ok_or_else(|| Exception::throw_message(ctx, msg))
    }
}

impl<T, E: Display> ResultExt<T> for std::result::Result<T, E> {
    fn or_throw(self, ctx: &Ctx<'_>) -> Result<T> {
        self.map_err(|e| Exception::throw_message(ctx, &e.to_string()))
    }

    fn or_throw_msg(self, ctx: &Ctx<'_>, msg: &str) -> Result<T> {
        self.map_err(|e| Exception::throw_message(ctx, &format!("{msg}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn compiles() {}
}
