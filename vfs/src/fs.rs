//! Filesystem virtual table for vsys
//!
//! Pluggable filesystem abstraction layer. Unlike a native CLI's vsys,
//! this one is backed by an in-memory path tree ([`crate::store::Vfs`])
//! rather than the host filesystem: the page this runtime lives in has no
//! disk of its own, and the whole point of the VFS is that package
//! installs, module writes, and scratch files are observable to every
//! consumer (loader, installer, REPL) without ever touching `std::fs`.

use std::path::Path;
use std::time::SystemTime;

use crate::error::{VsysError, VsysResult};
use crate::store::Vfs;

/// File type information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Other,
}

/// File statistics (platform-independent subset)
#[derive(Debug, Clone)]
pub struct FileStat {
    pub file_type: FileType,
    pub size: u64,
    pub readonly: bool,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }
}

/// Directory entry
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

/// File open options
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub create_new: bool,
    pub mode: u32,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }
    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SeekFrom {
    Start(u64),
    End(i64),
    Current(i64),
}

/// Opaque in-memory file handle. Since the backing store has no real file
/// descriptor, reads/writes/seeks operate on a private byte cursor that is
/// flushed back into the VFS on write.
pub struct FsHandle {
    vfs: Vfs,
    path: String,
    cursor: usize,
    buf: Vec<u8>,
    dirty: bool,
}

impl FsHandle {
    fn open(vfs: &Vfs, path: &str, options: &OpenOptions) -> VsysResult<Self> {
        let exists = vfs.exists(path);
        if options.create_new && exists {
            return Err(VsysError::InvalidArgument(format!("already exists: {path}")));
        }
        let buf = if exists && !options.truncate {
            vfs.read(path)?
        } else {
            if (options.create || options.create_new) && !exists {
                vfs.write(path, b"")?;
            }
            Vec::new()
        };
        let cursor = if options.append { buf.len() } else { 0 };
        Ok(Self {
            vfs: vfs.clone(),
            path: path.to_string(),
            cursor,
            buf,
            dirty: false,
        })
    }

    pub fn read(&mut self, out: &mut [u8]) -> VsysResult<usize> {
        let remaining = self.buf.len().saturating_sub(self.cursor);
        let n = remaining.min(out.len());
        out[..n].copy_from_slice(&self.buf[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    pub fn write(&mut self, data: &[u8]) -> VsysResult<usize> {
        let end = self.cursor + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.cursor..end].copy_from_slice(data);
        self.cursor = end;
        self.dirty = true;
        Ok(data.len())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> VsysResult<u64> {
        let new_cursor = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.cursor as i64 + n,
            SeekFrom::End(n) => self.buf.len() as i64 + n,
        };
        if new_cursor < 0 {
            return Err(VsysError::InvalidArgument("negative seek".to_string()));
        }
        self.cursor = new_cursor as usize;
        Ok(self.cursor as u64)
    }

    pub fn sync_all(&self) -> VsysResult<()> {
        if self.dirty {
            self.vfs.write(&self.path, &self.buf)?;
        }
        Ok(())
    }

    pub fn sync_data(&self) -> VsysResult<()> {
        self.sync_all()
    }

    pub fn stat(&self) -> VsysResult<FileStat> {
        let (is_file, size, modified, mode) = self.vfs.stat(&self.path)?;
        Ok(FileStat {
            file_type: if is_file { FileType::File } else { FileType::Directory },
            size: size as u64,
            readonly: false,
            modified: Some(modified),
            accessed: None,
            created: None,
            mode,
            uid: 0,
            gid: 0,
        })
    }

    pub fn set_len(&self, size: u64) -> VsysResult<()> {
        let mut data = self.vfs.read(&self.path).unwrap_or_default();
        data.resize(size as usize, 0);
        self.vfs.write(&self.path, &data)
    }

    pub fn set_permissions(&self, _readonly: bool) -> VsysResult<()> {
        Ok(())
    }

    pub fn set_mode(&self, _mode: u32) -> VsysResult<()> {
        Ok(())
    }
}

impl Drop for FsHandle {
    fn drop(&mut self) {
        let _ = self.sync_all();
    }
}

/// Filesystem operations vtable. Every function takes the backing [`Vfs`]
/// explicitly as state, the same way `ModuleLoaderVTable` takes an
/// explicit `&FsVTable` — no implementation is allowed to reach for
/// ambient global state.
pub struct FsVTable {
    pub read: fn(vfs: &Vfs, path: &Path) -> VsysResult<Vec<u8>>,
    pub read_to_string: fn(vfs: &Vfs, path: &Path) -> VsysResult<String>,
    pub stat: fn(vfs: &Vfs, path: &Path) -> VsysResult<FileStat>,
    pub lstat: fn(vfs: &Vfs, path: &Path) -> VsysResult<FileStat>,
    pub read_dir: fn(vfs: &Vfs, path: &Path) -> VsysResult<Vec<DirEntry>>,
    pub exists: fn(vfs: &Vfs, path: &Path) -> bool,
    pub is_file: fn(vfs: &Vfs, path: &Path) -> bool,
    pub is_dir: fn(vfs: &Vfs, path: &Path) -> bool,

    pub write: fn(vfs: &Vfs, path: &Path, data: &[u8]) -> VsysResult<()>,
    pub append: fn(vfs: &Vfs, path: &Path, data: &[u8]) -> VsysResult<()>,
    pub create_dir: fn(vfs: &Vfs, path: &Path) -> VsysResult<()>,
    pub create_dir_all: fn(vfs: &Vfs, path: &Path) -> VsysResult<()>,
    pub remove_file: fn(vfs: &Vfs, path: &Path) -> VsysResult<()>,
    pub remove_dir: fn(vfs: &Vfs, path: &Path) -> VsysResult<()>,
    pub remove_dir_all: fn(vfs: &Vfs, path: &Path) -> VsysResult<()>,
    pub rename: fn(vfs: &Vfs, from: &Path, to: &Path) -> VsysResult<()>,

    pub access: fn(vfs: &Vfs, path: &Path, mode: u32) -> VsysResult<()>,
    pub open: fn(vfs: &Vfs, path: &Path, options: &OpenOptions) -> VsysResult<FsHandle>,
}

impl Default for FsVTable {
    fn default() -> Self {
        Self {
            read: default_read,
            read_to_string: default_read_to_string,
            stat: default_stat,
            lstat: default_stat,
            read_dir: default_read_dir,
            exists: default_exists,
            is_file: default_is_file,
            is_dir: default_is_dir,
            write: default_write,
            append: default_append,
            create_dir: default_create_dir,
            create_dir_all: default_create_dir_all,
            remove_file: default_remove_file,
            remove_dir: default_remove_dir,
            remove_dir_all: default_remove_dir_all,
            rename: default_rename,
            access: default_access,
            open: default_open,
        }
    }
}

impl FsVTable {
    /// A vtable that denies every operation, for a fully sandboxed runtime.
    pub fn deny_all() -> Self {
        Self {
            read: |_, _| Err(VsysError::PermissionDenied("fs read denied".into())),
            read_to_string: |_, _| Err(VsysError::PermissionDenied("fs read denied".into())),
            stat: |_, _| Err(VsysError::PermissionDenied("fs stat denied".into())),
            lstat: |_, _| Err(VsysError::PermissionDenied("fs lstat denied".into())),
            read_dir: |_, _| Err(VsysError::PermissionDenied("fs readdir denied".into())),
            exists: |_, _| false,
            is_file: |_, _| false,
            is_dir: |_, _| false,
            write: |_, _, _| Err(VsysError::PermissionDenied("fs write denied".into())),
            append: |_, _, _| Err(VsysError::PermissionDenied("fs append denied".into())),
            create_dir: |_, _| Err(VsysError::PermissionDenied("fs mkdir denied".into())),
            create_dir_all: |_, _| Err(VsysError::PermissionDenied("fs mkdir denied".into())),
            remove_file: |_, _| Err(VsysError::PermissionDenied("fs remove denied".into())),
            remove_dir: |_, _| Err(VsysError::PermissionDenied("fs rmdir denied".into())),
            remove_dir_all: |_, _| Err(VsysError::PermissionDenied("fs rmdir denied".into())),
            rename: |_, _, _| Err(VsysError::PermissionDenied("fs rename denied".into())),
            access: |_, _, _| Err(VsysError::PermissionDenied("fs access denied".into())),
            open: |_, _, _| Err(VsysError::PermissionDenied("fs open denied".into())),
        }
    }

    /// A vtable that allows reads but rejects every mutation.
    pub fn read_only() -> Self {
        let mut vtable = Self::default();
        vtable.write = |_, _, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.append = |_, _, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.create_dir = |_, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.create_dir_all = |_, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.remove_file = |_, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.remove_dir = |_, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.remove_dir_all = |_, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable.rename = |_, _, _| Err(VsysError::PermissionDenied("fs is read-only".into()));
        vtable
    }
}

fn to_path(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

fn default_read(vfs: &Vfs, path: &Path) -> VsysResult<Vec<u8>> {
    vfs.read(&to_path(path))
}

fn default_read_to_string(vfs: &Vfs, path: &Path) -> VsysResult<String> {
    let bytes = vfs.read(&to_path(path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn default_stat(vfs: &Vfs, path: &Path) -> VsysResult<FileStat> {
    let (is_file, size, modified, mode) = vfs.stat(&to_path(path))?;
    Ok(FileStat {
        file_type: if is_file { FileType::File } else { FileType::Directory },
        size: size as u64,
        readonly: false,
        modified: Some(modified),
        accessed: None,
        created: None,
        mode,
        uid: 0,
        gid: 0,
    })
}

fn default_read_dir(vfs: &Vfs, path: &Path) -> VsysResult<Vec<DirEntry>> {
    let entries = vfs.read_dir(&to_path(path))?;
    Ok(entries
        .into_iter()
        .map(|(name, is_file)| DirEntry {
            name,
            file_type: if is_file { FileType::File } else { FileType::Directory },
        })
        .collect())
}

fn default_exists(vfs: &Vfs, path: &Path) -> bool {
    vfs.exists(&to_path(path))
}

fn default_is_file(vfs: &Vfs, path: &Path) -> bool {
    vfs.is_file(&to_path(path))
}

fn default_is_dir(vfs: &Vfs, path: &Path) -> bool {
    vfs.is_dir(&to_path(path))
}

fn default_write(vfs: &Vfs, path: &Path, data: &[u8]) -> VsysResult<()> {
    vfs.write(&to_path(path), data)
}

fn default_append(vfs: &Vfs, path: &Path, data: &[u8]) -> VsysResult<()> {
    vfs.append(&to_path(path), data)
}

fn default_create_dir(vfs: &Vfs, path: &Path) -> VsysResult<()> {
    vfs.mkdir(&to_path(path), false)
}

fn default_create_dir_all(vfs: &Vfs, path: &Path) -> VsysResult<()> {
    vfs.mkdir(&to_path(path), true)
}

fn default_remove_file(vfs: &Vfs, path: &Path) -> VsysResult<()> {
    vfs.remove_file(&to_path(path))
}

fn default_remove_dir(vfs: &Vfs, path: &Path) -> VsysResult<()> {
    vfs.remove_dir(&to_path(path), false)
}

fn default_remove_dir_all(vfs: &Vfs, path: &Path) -> VsysResult<()> {
    vfs.remove_dir(&to_path(path), true)
}

fn default_rename(vfs: &Vfs, from: &Path, to: &Path) -> VsysResult<()> {
    vfs.rename(&to_path(from), &to_path(to))
}

fn default_access(vfs: &Vfs, path: &Path, _mode: u32) -> VsysResult<()> {
    if vfs.exists(&to_path(path)) {
        Ok(())
    } else {
        Err(VsysError::NotFound(format!(
            "no such file or directory: {}",
            to_path(path)
        )))
    }
}

fn default_open(vfs: &Vfs, path: &Path, options: &OpenOptions) -> VsysResult<FsHandle> {
    FsHandle::open(vfs, &to_path(path), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fs_read_write() {
        let vfs = Vfs::new();
        let vtable = FsVTable::default();
        let path = Path::new("/test.txt");

        (vtable.write)(&vfs, path, b"hello world").unwrap();
        assert_eq!((vtable.read)(&vfs, path).unwrap(), b"hello world");
        assert_eq!((vtable.read_to_string)(&vfs, path).unwrap(), "hello world");
        let stat = (vtable.stat)(&vfs, path).unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size, 11);
    }

    #[test]
    fn deny_all_fs() {
        let vfs = Vfs::new();
        let vtable = FsVTable::deny_all();
        assert!((vtable.read)(&vfs, Path::new("/x")).is_err());
        assert!(!(vtable.exists)(&vfs, Path::new("/")));
    }

    #[test]
    fn read_only_fs() {
        let vfs = Vfs::new();
        vfs.write("/test.txt", b"test").unwrap();
        let vtable = FsVTable::read_only();
        assert_eq!((vtable.read)(&vfs, Path::new("/test.txt")).unwrap(), b"test");
        assert!((vtable.write)(&vfs, Path::new("/test.txt"), b"new").is_err());
    }

    #[test]
    fn append_through_vtable() {
        let vfs = Vfs::new();
        let vtable = FsVTable::default();
        let path = Path::new("/append.txt");
        (vtable.write)(&vfs, path, b"hello").unwrap();
        (vtable.append)(&vfs, path, b" world").unwrap();
        assert_eq!((vtable.read_to_string)(&vfs, path).unwrap(), "hello world");
    }

    #[test]
    fn open_and_handle_round_trip() {
        let vfs = Vfs::new();
        let vtable = FsVTable::default();
        let path = Path::new("/handle.txt");

        let options = OpenOptions::new().write(true).create(true);
        let mut handle = (vtable.open)(&vfs, path, &options).unwrap();
        handle.write(b"hello from handle").unwrap();
        handle.sync_all().unwrap();
        drop(handle);

        let options = OpenOptions::new().read(true);
        let mut handle = (vtable.open)(&vfs, path, &options).unwrap();
        let mut buf = vec![0u8; 64];
        let n = handle.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello from handle");
    }
}
