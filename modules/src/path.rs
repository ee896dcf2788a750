//! POSIX `path` builtin. The runtime only ever deals in POSIX-style VFS
//! paths (see `sprout_vfs::store::normalize`), so there is no separate
//! `path.win32`/`path.posix` split here.

use rsquickjs::prelude::Func;
use rsquickjs::{
    module::{Declarations, Exports, ModuleDef},
    Ctx, Object, Result,
};

use crate::utils::module::{export_default, ModuleInfo};

fn normalize(path: &str) -> String {
    sprout_vfs::store::normalize(path)
}

fn join(parts: Vec<String>) -> String {
    if parts.is_empty() {
        return ".".to_string();
    }
    normalize(&parts.join("/"))
}

fn resolve(parts: Vec<String>) -> String {
    let mut acc = String::from("/");
    for part in parts {
        if part.starts_with('/') {
            acc = part;
        } else {
            acc = format!("{}/{}", acc.trim_end_matches('/'), part);
        }
    }
    normalize(&acc)
}

fn dirname(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
        None => ".".to_string(),
    }
}

fn basename(path: &str, ext: Option<String>) -> String {
    let normalized = normalize(path);
    let base = normalized.rsplit('/').next().unwrap_or(&normalized).to_string();
    match ext {
        Some(ext) if base.ends_with(&ext) && base != ext => base[..base.len() - ext.len()].to_string(),
        _ => base,
    }
}

fn extname(path: &str) -> String {
    let base = basename(path, None);
    match base.rfind('.') {
        Some(0) => String::new(),
        Some(idx) => base[idx..].to_string(),
        None => String::new(),
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

fn relative(from: &str, to: &str) -> String {
    let from_parts: Vec<&str> = normalize(from).split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = normalize(to).split('/').filter(|s| !s.is_empty()).collect();
    let common = from_parts.iter().zip(to_parts.iter()).take_while(|(a, b)| a == b).count();
    let mut segments: Vec<String> = vec!["..".to_string(); from_parts.len() - common];
    segments.extend(to_parts[common..].iter().map(|s| s.to_string()));
    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

fn build_path_object(ctx: &Ctx<'_>) -> Result<Object<'_>> {
    let path = Object::new(ctx.clone())?;
    path.set("sep", "/")?;
    path.set("delimiter", ":")?;
    path.set("normalize", Func::from(normalize))?;
    path.set("join", Func::from(join))?;
    path.set("resolve", Func::from(resolve))?;
    path.set("dirname", Func::from(dirname))?;
    path.set("basename", Func::from(basename))?;
    path.set("extname", Func::from(extname))?;
    path.set("isAbsolute", Func::from(is_absolute))?;
    path.set("relative", Func::from(relative))?;
    Ok(path)
}

pub fn init(ctx: &Ctx<'_>) -> Result<()> {
    let globals = ctx.globals();
    globals.set("__pathModule", build_path_object(ctx)?)?;
    Ok(())
}

pub struct PathModule;

impl ModuleDef for PathModule {
    fn declare(declare: &Declarations) -> Result<()> {
        declare.declare("sep")?;
        declare.declare("delimiter")?;
        declare.declare("normalize")?;
        declare.declare("join")?;
        declare.declare("resolve")?;
        declare.declare("dirname")?;
        declare.declare("basename")?;
        declare.declare("extname")?;
        declare.declare("isAbsolute")?;
        declare.declare("relative")?;
        declare.declare("default")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> Result<()> {
        let path = build_path_object(ctx)?;
        for key in path.keys::<String>() {
            let key = key?;
            let value: rsquickjs::Value = path.get(&key)?;
            exports.export(key, value)?;
        }
        export_default(ctx, exports, |default| {
            for key in path.keys::<String>() {
                let key = key?;
                let value: rsquickjs::Value = path.get(&key)?;
                default.set(key, value)?;
            }
            Ok(())
        })
    }
}

impl From<PathModule> for ModuleInfo<PathModule> {
    fn from(val: PathModule) -> Self {
        ModuleInfo {
            name: "path",
            module: val,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_and_normalizes() {
        assert_eq!(join(vec!["/a".into(), "b".into(), "..".into(), "c".into()]), "/a/c");
    }

    #[test]
    fn splits_dirname_and_basename() {
        assert_eq!(dirname("/a/b/c.js"), "/a/b");
        assert_eq!(basename("/a/b/c.js", None), "c.js");
        assert_eq!(basename("/a/b/c.js", Some(".js".to_string())), "c");
        assert_eq!(extname("/a/b/c.js"), ".js");
    }

    #[test]
    fn computes_relative_paths() {
        assert_eq!(relative("/a/b", "/a/c/d"), "../c/d");
    }
}
