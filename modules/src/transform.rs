//! ESM → CommonJS source rewrite, applied once at module-load time.
//!
//! This is a companion to [`crate::script`]'s TS/JSX stripping: that pass
//! turns TypeScript/JSX into plain JS, this pass turns plain-JS ESM import/
//! export forms into `require`/`exports` calls the synchronous loader in
//! [`crate::loader`] can execute directly. `import.meta` and dynamic
//! `import()` are rewritten unconditionally, independent of whether the
//! module has any static import/export declaration at all.
//!
//! The AST path collects `(start, end, replacement)` spans in a single deep
//! walk and splices them into the original source from the highest start
//! offset down, so earlier offsets stay valid while later ones are already
//! rewritten (spec's decomposed approach, not a full re-print via codegen —
//! this keeps untouched source, including comments and string contents,
//! byte-for-byte intact).

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Declaration, ExportDefaultDeclarationKind, ModuleExportName, Program, Statement,
};
use oxc::ast_visit::{walk, Visit};
use oxc::parser::{ParseOptions, Parser, ParserReturn};
use oxc::span::{GetSpan, SourceType, Span};

/// A single substring replacement, applied highest-span-first.
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

struct Collector<'a> {
    edits: Vec<Edit>,
    declaration_rewrites: Vec<Edit>,
    source: &'a str,
    has_export: bool,
}

impl<'a> Collector<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            edits: Vec::new(),
            declaration_rewrites: Vec::new(),
            source,
            has_export: false,
        }
    }

    fn slice(&self, span: Span) -> &'a str {
        &self.source[span.start as usize..span.end as usize]
    }

    /// Removes and returns any pending `import.meta`/dynamic-`import()`
    /// edits whose span falls entirely inside `span`. A declaration that's
    /// about to be re-rendered wholesale (e.g. `export const p = import(x)`)
    /// would otherwise double-edit: once here via the sliced text, and once
    /// more globally in `apply_edits` against offsets that no longer line
    /// up once this declaration's own rewrite has shifted the string.
    fn take_edits_within(&mut self, span: Span) -> Vec<Edit> {
        let (inside, outside): (Vec<Edit>, Vec<Edit>) = self
            .edits
            .drain(..)
            .partition(|e| e.start >= span.start && e.end <= span.end);
        self.edits = outside;
        inside
    }

    /// Like [`Self::slice`], but first applies (and consumes) any inner
    /// edits that land inside `span`, so a declaration rewritten wholesale
    /// still picks up `import.meta`/dynamic-`import()` rewrites nested
    /// inside it.
    fn slice_with_edits(&mut self, span: Span) -> String {
        let mut local_edits = self.take_edits_within(span);
        let mut out = self.slice(span).to_string();
        if local_edits.is_empty() {
            return out;
        }
        local_edits.sort_by(|a, b| b.start.cmp(&a.start));
        for edit in local_edits {
            let start = (edit.start - span.start) as usize;
            let end = (edit.end - span.start) as usize;
            out.replace_range(start..end, &edit.text);
        }
        out
    }
}

impl<'a> Visit<'a> for Collector<'a> {
    fn visit_meta_property(&mut self, it: &oxc::ast::ast::MetaProperty<'a>) {
        if it.meta.name == "import" && it.property.name == "meta" {
            self.edits.push(Edit {
                start: it.span.start,
                end: it.span.end,
                text: "import_meta".to_string(),
            });
        }
    }

    fn visit_import_expression(&mut self, it: &oxc::ast::ast::ImportExpression<'a>) {
        // Rewrite just the leading `import` keyword to `__dynamicImport`,
        // leaving the call's argument list span (and anything nested in
        // it, which we still recurse into below) untouched.
        let keyword_end = it.span.start + 6; // len("import")
        self.edits.push(Edit {
            start: it.span.start,
            end: keyword_end,
            text: "__dynamicImport".to_string(),
        });
        walk::walk_import_expression(self, it);
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

/// Names a `Declaration` introduces at its top level (`const`/`let`/`var`
/// declarators, or a named `function`/`class`).
fn declared_names(decl: &Declaration) -> Vec<String> {
    let mut names = Vec::new();
    match decl {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                collect_binding_names(&declarator.id.kind, &mut names);
            }
        }
        Declaration::FunctionDeclaration(f) => {
            if let Some(id) = &f.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(c) => {
            if let Some(id) = &c.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
    names
}

fn collect_binding_names(kind: &oxc::ast::ast::BindingPatternKind, out: &mut Vec<String>) {
    use oxc::ast::ast::BindingPatternKind as K;
    match kind {
        K::BindingIdentifier(id) => out.push(id.name.to_string()),
        K::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value.kind, out);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument.kind, out);
            }
        }
        K::ArrayPattern(arr) => {
            for el in arr.elements.iter().flatten() {
                collect_binding_names(&el.kind, out);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument.kind, out);
            }
        }
        K::AssignmentPattern(p) => collect_binding_names(&p.left.kind, out),
    }
}

fn collect_declarations(collector: &mut Collector, program: &Program) {
    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(import) => {
                collector.declaration_rewrites.push(Edit {
                    start: import.span.start,
                    end: import.span.end,
                    text: render_import(import),
                });
            }
            Statement::ExportNamedDeclaration(export) => {
                collector.has_export = true;
                let text = render_export_named(collector, export);
                collector.declaration_rewrites.push(Edit {
                    start: export.span.start,
                    end: export.span.end,
                    text,
                });
            }
            Statement::ExportDefaultDeclaration(export) => {
                collector.has_export = true;
                let text = render_export_default(collector, export);
                collector.declaration_rewrites.push(Edit {
                    start: export.span.start,
                    end: export.span.end,
                    text,
                });
            }
            Statement::ExportAllDeclaration(export) => {
                collector.has_export = true;
                collector.declaration_rewrites.push(Edit {
                    start: export.span.start,
                    end: export.span.end,
                    text: render_export_all(export),
                });
            }
            _ => {}
        }
    }
}

fn render_import(import: &oxc::ast::ast::ImportDeclaration) -> String {
    let source = import.source.value.to_string();
    let Some(specifiers) = &import.specifiers else {
        return format!("require({source:?});");
    };
    if specifiers.is_empty() {
        return format!("require({source:?});");
    }

    let mut named = Vec::new();
    let mut preamble = Vec::new();
    let require_expr = format!("require({source:?})");
    let mut module_var: Option<String> = None;

    let mut ensure_module_var = |preamble: &mut Vec<String>| -> String {
        if let Some(v) = &module_var {
            return v.clone();
        }
        let v = format!("__mod{}", import.span.start);
        preamble.push(format!("const {v} = {require_expr};"));
        module_var = Some(v.clone());
        v
    };

    for spec in specifiers {
        use oxc::ast::ast::ImportDeclarationSpecifier as S;
        match spec {
            S::ImportDefaultSpecifier(d) => {
                let mv = ensure_module_var(&mut preamble);
                preamble.push(format!(
                    "const {name} = {mv} && {mv}.__esModule ? {mv}.default : {mv};",
                    name = d.local.name
                ));
            }
            S::ImportNamespaceSpecifier(ns) => {
                let mv = ensure_module_var(&mut preamble);
                preamble.push(format!("const {name} = {mv};", name = ns.local.name));
            }
            S::ImportSpecifier(named_spec) => {
                let imported = export_name(&named_spec.imported);
                let local = named_spec.local.name.to_string();
                if imported == local {
                    named.push(imported);
                } else {
                    named.push(format!("{imported}: {local}"));
                }
            }
        }
    }

    if !named.is_empty() {
        preamble.push(format!("const {{ {} }} = {require_expr};", named.join(", ")));
    }
    preamble.join(" ")
}

fn render_export_named(
    collector: &mut Collector,
    export: &oxc::ast::ast::ExportNamedDeclaration,
) -> String {
    if let Some(decl) = &export.declaration {
        let original = collector.slice_with_edits(decl.span());
        let names = declared_names(decl);
        let mut out = original.clone();
        if !original.trim_end().ends_with(';') {
            out.push(';');
        }
        for name in names {
            out.push_str(&format!(" exports.{name} = {name};"));
        }
        return out;
    }

    if let Some(source) = &export.source {
        let module_var = format!("__reexport{}", export.span.start);
        let mut out = format!("const {module_var} = require({:?});", source.value);
        for spec in &export.specifiers {
            let local = export_name(&spec.local);
            let exported = export_name(&spec.exported);
            out.push_str(&format!(" exports.{exported} = {module_var}.{local};"));
        }
        return out;
    }

    let mut out = String::new();
    for spec in &export.specifiers {
        let local = export_name(&spec.local);
        let exported = export_name(&spec.exported);
        out.push_str(&format!("exports.{exported} = {local}; "));
    }
    out
}

fn render_export_default(
    collector: &mut Collector,
    export: &oxc::ast::ast::ExportDefaultDeclaration,
) -> String {
    match &export.declaration {
        ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
            let original = collector.slice_with_edits(f.span);
            if let Some(id) = &f.id {
                format!("{original} exports.default = {name};", name = id.name)
            } else {
                format!("exports.default = {original};")
            }
        }
        ExportDefaultDeclarationKind::ClassDeclaration(c) => {
            let original = collector.slice_with_edits(c.span);
            if let Some(id) = &c.id {
                format!("{original} exports.default = {name};", name = id.name)
            } else {
                format!("exports.default = {original};")
            }
        }
        expr => {
            let span = expr.span();
            let original = collector.slice_with_edits(span);
            format!("exports.default = {original};")
        }
    }
}

fn render_export_all(export: &oxc::ast::ast::ExportAllDeclaration) -> String {
    let module_var = format!("__reexportAll{}", export.span.start);
    let mut out = format!("const {module_var} = require({:?});", export.source.value);
    if let Some(exported) = &export.exported {
        out.push_str(&format!(
            " exports.{name} = {module_var};",
            name = export_name(exported)
        ));
    } else {
        out.push_str(&format!(
            " for (const __k in {module_var}) {{ if (__k !== 'default') exports[__k] = {module_var}[__k]; }}"
        ));
    }
    out
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = source.to_string();
    for edit in edits {
        out.replace_range(edit.start as usize..edit.end as usize, &edit.text);
    }
    out
}

/// Cheap token scan used to skip the parser entirely for plain CommonJS
/// sources (the idempotence contract: `transform(c) == c` whenever `c`
/// has no top-level `import`/`export`).
fn mentions_esm_tokens(source: &str) -> bool {
    let mut in_ident = false;
    let mut start = 0usize;
    for (i, c) in source.char_indices() {
        let is_ident_char = c.is_alphanumeric() || c == '_' || c == '$';
        if is_ident_char && !in_ident {
            in_ident = true;
            start = i;
        } else if !is_ident_char && in_ident {
            in_ident = false;
            let word = &source[start..i];
            if word == "import" || word == "export" {
                return true;
            }
        }
    }
    in_ident && matches!(&source[start..], "import" | "export")
}

fn source_type_for(path: &str) -> SourceType {
    match path.rsplit('.').next().unwrap_or("") {
        "mjs" | "mts" => SourceType::mjs(),
        "cjs" | "cts" => SourceType::cjs(),
        "jsx" => SourceType::jsx(),
        "ts" => SourceType::ts(),
        "tsx" => SourceType::tsx(),
        _ => SourceType::mjs(),
    }
}

/// Rewrites ESM import/export syntax (plus `import.meta` and dynamic
/// `import()`, unconditionally) into CommonJS. A no-op for any source with
/// no top-level import/export and no `import.meta`/`import()` use.
pub fn transform(path: &str, source: &str) -> String {
    if !mentions_esm_tokens(source) {
        return source.to_string();
    }

    let allocator = Allocator::default();
    let source_type = source_type_for(path);
    let ParserReturn {
        program, panicked, ..
    } = Parser::new(&allocator, source, source_type)
        .with_options(ParseOptions {
            parse_regular_expression: true,
            ..ParseOptions::default()
        })
        .parse();

    if panicked {
        return regex_fallback(source);
    }

    let mut collector = Collector::new(source);
    collector.visit_program(&program);
    collect_declarations(&mut collector, &program);

    let mut edits = collector.edits;
    edits.extend(collector.declaration_rewrites);
    let has_export = collector.has_export;

    let mut output = apply_edits(source, edits);
    if has_export {
        output = format!(
            "Object.defineProperty(exports, \"__esModule\", {{ value: true }});\n{output}"
        );
    }
    output
}

/// Best-effort regex approximation used when the parser fails (spec §4.4
/// Fallback). Imprecise inside template literals/comments by design — this
/// is the documented open question, not a bug to chase.
fn regex_fallback(source: &str) -> String {
    let mut out = source
        .replace("import.meta.url", "import_meta.url")
        .replace("import.meta.dirname", "import_meta.dirname")
        .replace("import.meta.filename", "import_meta.filename")
        .replace("import.meta", "import_meta");

    // `import(` preceded by an identifier char is a method/property call,
    // not the dynamic-import keyword; skip those.
    let bytes: Vec<char> = out.chars().collect();
    let mut result = String::with_capacity(out.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(&['i', 'm', 'p', 'o', 'r', 't', '('])
            && (i == 0 || !is_ident_char(bytes[i - 1]))
        {
            result.push_str("__dynamicImport(");
            i += 7;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    out = result;
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commonjs_source_is_untouched() {
        let src = "module.exports = { foo: 1 };\nconst x = require('bar');";
        assert_eq!(transform("/x.js", src), src);
    }

    #[test]
    fn default_export_sets_esmodule_flag() {
        let out = transform("/x.js", "export default 42;");
        assert!(out.contains("__esModule"));
        assert!(out.contains("exports.default = 42;"));
    }

    #[test]
    fn named_import_destructures_require() {
        let out = transform("/x.js", "import { a, b as c } from 'mod';\nconsole.log(a, c);");
        assert!(out.contains("const { a, b: c } = require(\"mod\");"));
    }

    #[test]
    fn default_import_unwraps_esmodule_marker() {
        let out = transform("/x.js", "import foo from 'mod';\nfoo();");
        assert!(out.contains("__mod"));
        assert!(out.contains("foo = "));
    }

    #[test]
    fn namespace_import_binds_whole_module() {
        let out = transform("/x.js", "import * as ns from 'mod';\nns.x();");
        assert!(out.contains("const ns = __mod"));
    }

    #[test]
    fn side_effect_import_only_requires() {
        let out = transform("/x.js", "import 'mod';\n1;");
        assert!(out.contains("require(\"mod\");"));
    }

    #[test]
    fn import_meta_rewritten_without_any_declaration() {
        let out = transform("/x.js", "console.log(import.meta.url);");
        assert_eq!(out, "console.log(import_meta.url);");
    }

    #[test]
    fn dynamic_import_rewritten_without_any_declaration() {
        let out = transform("/x.js", "import('mod').then(m => m.default());");
        assert!(out.starts_with("__dynamicImport(\"mod\")") || out.starts_with("__dynamicImport('mod')"));
    }

    #[test]
    fn export_star_reexports_everything_but_default() {
        let out = transform("/x.js", "export * from 'mod';");
        assert!(out.contains("require(\"mod\")"));
        assert!(out.contains("__k !== 'default'"));
    }

    #[test]
    fn export_named_reexport_with_source() {
        let out = transform("/x.js", "export { a, b as c } from 'mod';");
        assert!(out.contains("exports.a ="));
        assert!(out.contains("exports.c ="));
    }

    #[test]
    fn dynamic_import_inside_export_declaration_is_rewritten() {
        let out = transform("/x.js", "export const p = import('./x');\n1;");
        assert!(out.contains("__dynamicImport(\"./x\")") || out.contains("__dynamicImport('./x')"));
        assert!(out.contains("exports.p = p;"));
        assert!(!out.contains("= import("));
    }

    #[test]
    fn import_meta_inside_default_export_is_rewritten() {
        let out = transform("/x.js", "export default function f() { return import.meta.url; }");
        assert!(out.contains("import_meta.url"));
        assert!(!out.contains("import.meta"));
    }
}
