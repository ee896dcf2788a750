//! Interactive REPL (spec.md §4.5 "REPL"): `createREPL()` returns an
//! object with one method, `eval(source)`, whose variable bindings persist
//! across calls. Persistence is implemented exactly as spec.md documents:
//! a generator's local scope stays alive across `yield`, so a direct
//! `eval` inside it keeps every `var` declaration it makes — `const`/`let`
//! are rewritten to `var` before evaluating so declarations hoist into
//! that surviving scope instead of block-scoping themselves away.
//!
//! [`Repl`] is the Rust-side handle: it owns a [`sprout_modules::runtime::Runtime`]
//! and the `Persistent` JS object `createREPL()` produced, and exposes
//! `eval` as a plain Rust method so a host (the CLI shell, a test) never
//! touches `rsquickjs` types directly.

use std::sync::Arc;

use rsquickjs::{CatchResultExt, Ctx, Exception, Function, Object, Persistent, Result, Value};
use sprout_modules::runtime::{Runtime, RuntimeOptions};
use sprout_vfs::Vsys;

/// `const`/`let` are rewritten to `var` with a word-boundary regex rather
/// than a full reparse — the same "best-effort" latitude the module
/// transformer's regex fallback gets; a REPL line is small enough that a
/// keyword appearing inside a string literal is a rare, tolerable miss.
fn declarations_to_var(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &source[i..];
        let matched = ["const", "let"].into_iter().find(|kw| {
            rest.starts_with(kw)
                && rest[kw.len()..].chars().next().is_none_or(|c| !c.is_alphanumeric() && c != '_' && c != '$')
                && (i == 0 || !matches!(bytes[i - 1] as char, c if c.is_alphanumeric() || c == '_' || c == '$'))
        });
        match matched {
            Some(kw) => {
                out.push_str("var");
                i += kw.len();
            }
            None => {
                let ch = rest.chars().next().unwrap();
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    out
}

const CREATE_REPL_SRC: &str = r#"
(function() {
  function createREPL() {
    function* body() {
      let result;
      while (true) {
        const rewritten = yield result;
        try {
          result = eval("(" + rewritten + ")");
        } catch (parenErr) {
          result = eval(rewritten);
        }
      }
    }
    const gen = body();
    gen.next();
    return {
      eval: function(rewritten) {
        return gen.next(rewritten).value;
      },
    };
  }
  return createREPL;
})()
"#;

/// One REPL session: a runtime plus the persistent binding environment
/// `createREPL()` set up inside it.
pub struct Repl {
    runtime: Runtime,
    repl_obj: Persistent<Object<'static>>,
}

impl Repl {
    pub fn new(vsys: Arc<Vsys>, opts: RuntimeOptions) -> Result<Self> {
        let runtime = Runtime::new(vsys, opts)?;
        let repl_obj = runtime.context.with(|ctx| -> Result<Persistent<Object<'static>>> {
            let create_repl: Function = ctx.eval(CREATE_REPL_SRC)?;
            let obj: Object = create_repl.call(())?;
            Ok(Persistent::save(&ctx, obj))
        })?;
        Ok(Self { runtime, repl_obj })
    }

    /// Evaluates `source` against this REPL's persistent binding
    /// environment and returns the last expression's value, kept alive
    /// via [`Persistent`] past this call.
    pub fn eval(&self, source: &str) -> Result<Persistent<Value<'static>>> {
        let rewritten = declarations_to_var(source);
        self.runtime.context.with(|ctx| -> Result<Persistent<Value<'static>>> {
            let obj = self.repl_obj.clone().restore(&ctx)?;
            let eval_fn: Function = obj.get("eval")?;
            let result: Value = eval_fn.call((rewritten,)).catch(&ctx).map_err(|e| Exception::throw_message(&ctx, &format!("{e:?}")))?;
            Ok(Persistent::save(&ctx, result))
        })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_declarations_outside_identifiers() {
        assert_eq!(declarations_to_var("let x = 1"), "var x = 1");
        assert_eq!(declarations_to_var("const y = 2"), "var y = 2");
        assert_eq!(declarations_to_var("letter + constant"), "letter + constant");
        assert_eq!(declarations_to_var("const a = 1; let b = a + 1;"), "var a = 1; var b = a + 1;");
    }

    fn as_f64(ctx: &Ctx<'_>, persisted: Persistent<Value<'static>>) -> f64 {
        let value: Value<'_> = persisted.restore(ctx).unwrap();
        value.as_number().unwrap()
    }

    #[test]
    fn bindings_persist_across_calls() {
        let vsys = Arc::new(Vsys::builder().build());
        let repl = Repl::new(vsys, RuntimeOptions::default()).unwrap();
        repl.eval("let counter = 10").unwrap();
        let persisted = repl.eval("counter + 5").unwrap();
        let value = repl.runtime.context.with(|ctx| as_f64(&ctx, persisted));
        assert_eq!(value, 15.0);
    }

    #[test]
    fn falls_back_to_statement_list_on_paren_syntax_error() {
        let vsys = Arc::new(Vsys::builder().build());
        let repl = Repl::new(vsys, RuntimeOptions::default()).unwrap();
        // `let x = 1` is not a valid parenthesized expression; the REPL
        // must retry as a statement list instead of erroring out.
        let persisted = repl.eval("let x = 1;").unwrap();
        let is_undefined = repl.runtime.context.with(|ctx| -> bool { persisted.restore(&ctx).unwrap().is_undefined() });
        assert!(is_undefined);
        let readback = repl.eval("x").unwrap();
        let n = repl.runtime.context.with(|ctx| as_f64(&ctx, readback));
        assert_eq!(n, 1.0);
    }
}
