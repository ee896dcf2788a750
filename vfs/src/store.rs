//! In-memory, path-addressed file tree backing [`crate::fs::FsVTable`].
//!
//! Paths are always absolute POSIX paths (`/`-delimited). The tree never
//! touches the host filesystem; it exists for the lifetime of the `Vfs`
//! value, making it suitable for a page session that has no real disk.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{VsysError, VsysResult};

#[derive(Debug, Clone)]
pub enum Node {
    File(FileNode),
    Directory,
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub content: Vec<u8>,
    pub mode: u32,
    pub modified: SystemTime,
}

pub type WatchEvent = (WatchKind, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Change,
    Delete,
    Add,
}

struct Watcher {
    root: String,
    recursive: bool,
    listener: Box<dyn Fn(WatchEvent) + Send + Sync>,
}

/// The tree itself, plus registered watchers. Guarded by a single lock
/// because the surrounding runtime model is cooperative single-threaded
/// (spec's scheduling model), not genuinely concurrent.
struct Tree {
    nodes: HashMap<String, Node>,
    /// Directory → direct child names, kept alongside `nodes` so
    /// `read_dir` doesn't need a full scan.
    children: HashMap<String, BTreeSet<String>>,
    next_watcher_id: u64,
    watchers: Vec<(u64, Watcher)>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), Node::Directory);
        let mut children = HashMap::new();
        children.insert("/".to_string(), BTreeSet::new());
        Self {
            nodes,
            children,
            next_watcher_id: 0,
            watchers: Vec::new(),
        }
    }
}

/// Normalizes a POSIX path: collapses `.`/`..`/repeated slashes, always
/// returns an absolute path. Idempotent (`normalize(normalize(p)) == normalize(p)`).
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let idx = path.rfind('/')?;
    if idx == 0 {
        Some("/".to_string())
    } else {
        Some(path[..idx].to_string())
    }
}

fn basename(path: &str) -> &str {
    if path == "/" {
        "/"
    } else {
        path.rsplit('/').next().unwrap_or(path)
    }
}

#[derive(Clone)]
pub struct Vfs {
    tree: std::sync::Arc<RwLock<Tree>>,
}

impl Vfs {
    pub fn new() -> Self {
        Self {
            tree: std::sync::Arc::new(RwLock::new(Tree::new())),
        }
    }

    fn notify(tree: &Tree, path: &str, kind: WatchKind, extra: Option<&[u8]>) {
        let _ = extra;
        for (_, watcher) in &tree.watchers {
            let is_in_scope = if watcher.recursive {
                path == watcher.root || path.starts_with(&format!("{}/", watcher.root.trim_end_matches('/')))
            } else {
                parent_of(path).as_deref() == Some(watcher.root.as_str()) || path == watcher.root
            };
            if !is_in_scope {
                continue;
            }
            let rel = path
                .strip_prefix(&watcher.root)
                .unwrap_or(path)
                .trim_start_matches('/')
                .to_string();
            (watcher.listener)((kind, rel));
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        self.tree.read().unwrap().nodes.contains_key(&path)
    }

    pub fn is_file(&self, path: &str) -> bool {
        let path = normalize(path);
        matches!(self.tree.read().unwrap().nodes.get(&path), Some(Node::File(_)))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let path = normalize(path);
        matches!(self.tree.read().unwrap().nodes.get(&path), Some(Node::Directory))
    }

    pub fn read(&self, path: &str) -> VsysResult<Vec<u8>> {
        let path = normalize(path);
        let tree = self.tree.read().unwrap();
        match tree.nodes.get(&path) {
            Some(Node::File(f)) => Ok(f.content.clone()),
            Some(Node::Directory) => Err(VsysError::InvalidArgument(
                "illegal operation on directory".to_string(),
            )),
            None => Err(VsysError::NotFound(format!(
                "no such file or directory: {path}"
            ))),
        }
    }

    pub fn stat(&self, path: &str) -> VsysResult<(bool, usize, SystemTime, u32)> {
        let path = normalize(path);
        let tree = self.tree.read().unwrap();
        match tree.nodes.get(&path) {
            Some(Node::File(f)) => Ok((true, f.content.len(), f.modified, f.mode)),
            Some(Node::Directory) => Ok((false, 0, UNIX_EPOCH, 0o755)),
            None => Err(VsysError::NotFound(format!(
                "no such file or directory: {path}"
            ))),
        }
    }

    pub fn read_dir(&self, path: &str) -> VsysResult<Vec<(String, bool)>> {
        let path = normalize(path);
        let tree = self.tree.read().unwrap();
        if !matches!(tree.nodes.get(&path), Some(Node::Directory)) {
            return Err(VsysError::NotSupported("not a directory".to_string()));
        }
        let names = tree.children.get(&path).cloned().unwrap_or_default();
        Ok(names
            .into_iter()
            .map(|name| {
                let full = if path == "/" {
                    format!("/{name}")
                } else {
                    format!("{path}/{name}")
                };
                let is_file = matches!(tree.nodes.get(&full), Some(Node::File(_)));
                (name, is_file)
            })
            .collect())
    }

    /// Writes a file, requiring all ancestor directories already exist —
    /// per spec.md §3, `writeFileSync` does not auto-create missing
    /// ancestors (only `mkdirSync({recursive:true})` does).
    pub fn write(&self, path: &str, data: &[u8]) -> VsysResult<()> {
        let path = normalize(path);
        let parent = parent_of(&path);
        let mut tree = self.tree.write().unwrap();
        if let Some(parent) = &parent {
            if !matches!(tree.nodes.get(parent), Some(Node::Directory)) {
                return Err(VsysError::NotFound(format!(
                    "no such file or directory: {path}"
                )));
            }
        }
        let existed = tree.nodes.contains_key(&path);
        tree.nodes.insert(
            path.clone(),
            Node::File(FileNode {
                content: data.to_vec(),
                mode: 0o644,
                modified: SystemTime::now(),
            }),
        );
        if let Some(parent) = &parent {
            tree.children
                .entry(parent.clone())
                .or_default()
                .insert(basename(&path).to_string());
        }
        Self::notify(
            &tree,
            &path,
            if existed { WatchKind::Change } else { WatchKind::Add },
            Some(data),
        );
        Ok(())
    }

    pub fn append(&self, path: &str, data: &[u8]) -> VsysResult<()> {
        let existing = self.read(path).unwrap_or_default();
        let mut combined = existing;
        combined.extend_from_slice(data);
        self.write(path, &combined)
    }

    pub fn mkdir(&self, path: &str, recursive: bool) -> VsysResult<()> {
        let path = normalize(path);
        let mut tree = self.tree.write().unwrap();
        if recursive {
            let mut current = String::new();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                let parent = if current.is_empty() {
                    "/".to_string()
                } else {
                    current.clone()
                };
                current = format!("{}/{}", current, segment);
                if !tree.nodes.contains_key(&current) {
                    tree.nodes.insert(current.clone(), Node::Directory);
                    tree.children.entry(current.clone()).or_default();
                    tree.children
                        .entry(parent)
                        .or_default()
                        .insert(segment.to_string());
                } else if !matches!(tree.nodes.get(&current), Some(Node::Directory)) {
                    return Err(VsysError::NotSupported("not a directory".to_string()));
                }
            }
            return Ok(());
        }
        let parent = parent_of(&path);
        if let Some(parent) = &parent {
            if !matches!(tree.nodes.get(parent), Some(Node::Directory)) {
                return Err(VsysError::NotFound(format!(
                    "no such file or directory: {path}"
                )));
            }
        }
        if tree.nodes.contains_key(&path) {
            return Err(VsysError::InvalidArgument(format!("already exists: {path}")));
        }
        tree.nodes.insert(path.clone(), Node::Directory);
        tree.children.entry(path.clone()).or_default();
        if let Some(parent) = &parent {
            tree.children
                .entry(parent.clone())
                .or_default()
                .insert(basename(&path).to_string());
        }
        Ok(())
    }

    pub fn remove_file(&self, path: &str) -> VsysResult<()> {
        let path = normalize(path);
        let mut tree = self.tree.write().unwrap();
        match tree.nodes.get(&path) {
            Some(Node::File(_)) => {}
            Some(Node::Directory) => {
                return Err(VsysError::NotSupported(
                    "illegal operation on directory".to_string(),
                ))
            }
            None => {
                return Err(VsysError::NotFound(format!(
                    "no such file or directory: {path}"
                )))
            }
        }
        tree.nodes.remove(&path);
        if let Some(parent) = parent_of(&path) {
            if let Some(siblings) = tree.children.get_mut(&parent) {
                siblings.remove(basename(&path));
            }
        }
        Self::notify(&tree, &path, WatchKind::Delete, None);
        Ok(())
    }

    pub fn remove_dir(&self, path: &str, recursive: bool) -> VsysResult<()> {
        let path = normalize(path);
        if !self.is_dir(&path) {
            return Err(VsysError::NotFound(format!(
                "no such file or directory: {path}"
            )));
        }
        let mut to_delete: Vec<String> = {
            let tree = self.tree.read().unwrap();
            tree.nodes
                .keys()
                .filter(|p| *p == &path || p.starts_with(&format!("{}/", path.trim_end_matches('/'))))
                .cloned()
                .collect()
        };
        if !recursive && to_delete.len() > 1 {
            return Err(VsysError::InvalidArgument("directory not empty".to_string()));
        }
        // Files before directories, deepest first, so watchers observe
        // file deletions before the parent directory's — per spec.md §4.1.
        to_delete.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let mut tree = self.tree.write().unwrap();
        for entry in &to_delete {
            if entry == &path {
                continue;
            }
            tree.nodes.remove(entry);
            tree.children.remove(entry);
            Self::notify(&tree, entry, WatchKind::Delete, None);
        }
        tree.nodes.remove(&path);
        tree.children.remove(&path);
        if let Some(parent) = parent_of(&path) {
            if let Some(siblings) = tree.children.get_mut(&parent) {
                siblings.remove(basename(&path));
            }
        }
        Self::notify(&tree, &path, WatchKind::Delete, None);
        Ok(())
    }

    pub fn rename(&self, from: &str, to: &str) -> VsysResult<()> {
        let from = normalize(from);
        let to = normalize(to);
        let content = self.read(&from)?;
        self.write(&to, &content)?;
        self.remove_file(&from)
    }

    pub fn watch(
        &self,
        path: &str,
        recursive: bool,
        listener: impl Fn(WatchEvent) + Send + Sync + 'static,
    ) -> u64 {
        let path = normalize(path);
        let mut tree = self.tree.write().unwrap();
        let id = tree.next_watcher_id;
        tree.next_watcher_id += 1;
        tree.watchers.push((
            id,
            Watcher {
                root: path,
                recursive,
                listener: Box::new(listener),
            },
        ));
        id
    }

    pub fn unwatch(&self, id: u64) {
        let mut tree = self.tree.write().unwrap();
        tree.watchers.retain(|(wid, _)| *wid != id);
    }

    /// `{ files: [{path, type, content?}] }`, matching spec.md §6's
    /// snapshot format (binary content base64-encoded at the JS boundary;
    /// here we keep raw bytes and let the caller choose the encoding).
    pub fn snapshot(&self) -> Vec<(String, bool, Option<Vec<u8>>)> {
        let tree = self.tree.read().unwrap();
        let mut entries: Vec<_> = tree
            .nodes
            .iter()
            .map(|(path, node)| match node {
                Node::File(f) => (path.clone(), true, Some(f.content.clone())),
                Node::Directory => (path.clone(), false, None),
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn restore_from_snapshot(&self, entries: Vec<(String, bool, Option<Vec<u8>>)>) {
        let mut tree = self.tree.write().unwrap();
        tree.nodes.clear();
        tree.children.clear();
        tree.nodes.insert("/".to_string(), Node::Directory);
        tree.children.insert("/".to_string(), BTreeSet::new());
        // Directories first (sorted by depth) so `children` index population
        // below never misses a parent bucket.
        let mut dirs: Vec<_> = entries.iter().filter(|(_, is_file, _)| !is_file).collect();
        dirs.sort_by_key(|(p, _, _)| p.matches('/').count());
        for (path, _, _) in dirs {
            if path == "/" {
                continue;
            }
            tree.nodes.insert(path.clone(), Node::Directory);
            tree.children.entry(path.clone()).or_default();
            if let Some(parent) = parent_of(path) {
                tree.children
                    .entry(parent)
                    .or_default()
                    .insert(basename(path).to_string());
            }
        }
        for (path, is_file, content) in entries {
            if !is_file {
                continue;
            }
            tree.nodes.insert(
                path.clone(),
                Node::File(FileNode {
                    content: content.unwrap_or_default(),
                    mode: 0o644,
                    modified: SystemTime::now(),
                }),
            );
            if let Some(parent) = parent_of(&path) {
                tree.children
                    .entry(parent)
                    .or_default()
                    .insert(basename(&path).to_string());
            }
        }
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for p in ["/a/b/../c", "/a//b/./c/", "a/b", "/../../a"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn root_always_exists() {
        let vfs = Vfs::new();
        assert!(vfs.is_dir("/"));
    }

    #[test]
    fn write_requires_existing_parent() {
        let vfs = Vfs::new();
        assert!(vfs.write("/missing/file.js", b"x").is_err());
        vfs.mkdir("/missing", false).unwrap();
        vfs.write("/missing/file.js", b"x").unwrap();
        assert_eq!(vfs.read("/missing/file.js").unwrap(), b"x");
    }

    #[test]
    fn mkdir_recursive_is_idempotent() {
        let vfs = Vfs::new();
        vfs.mkdir("/a/b/c", true).unwrap();
        vfs.mkdir("/a/b/c", true).unwrap();
        assert!(vfs.is_dir("/a/b/c"));
    }

    #[test]
    fn reading_a_directory_fails() {
        let vfs = Vfs::new();
        vfs.mkdir("/dir", true).unwrap();
        assert!(vfs.read("/dir").is_err());
    }

    #[test]
    fn watch_fires_in_registration_order() {
        let vfs = Vfs::new();
        vfs.mkdir("/a", true).unwrap();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        vfs.watch("/a", false, move |(_, name)| o1.lock().unwrap().push(format!("1:{name}")));
        let o2 = order.clone();
        vfs.watch("/a", false, move |(_, name)| o2.lock().unwrap().push(format!("2:{name}")));
        vfs.write("/a/f.js", b"x").unwrap();
        let log = order.lock().unwrap();
        assert_eq!(&*log, &["1:f.js".to_string(), "2:f.js".to_string()]);
    }

    #[test]
    fn recursive_delete_emits_files_before_directory() {
        let vfs = Vfs::new();
        vfs.mkdir("/pkg", true).unwrap();
        vfs.write("/pkg/index.js", b"1").unwrap();
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let e = events.clone();
        vfs.watch("/", true, move |ev| e.lock().unwrap().push(ev));
        vfs.remove_dir("/pkg", true).unwrap();
        let log = events.lock().unwrap();
        let file_idx = log.iter().position(|(_, p)| p == "pkg/index.js").unwrap();
        let dir_idx = log.iter().position(|(_, p)| p == "pkg").unwrap();
        assert!(file_idx < dir_idx);
    }

    #[test]
    fn snapshot_round_trips() {
        let vfs = Vfs::new();
        vfs.mkdir("/a/b", true).unwrap();
        vfs.write("/a/b/f.txt", b"hello").unwrap();
        let snap = vfs.snapshot();
        let restored = Vfs::new();
        restored.restore_from_snapshot(snap);
        assert!(restored.is_dir("/a/b"));
        assert_eq!(restored.read("/a/b/f.txt").unwrap(), b"hello");
    }
}
