//! Tarball extractor (spec.md §4.2/§6).
//!
//! Grounded on Cotton's `async-compression` usage in
//! `plan.rs::download_package`, but ustar parsing is owned directly (as
//! spec.md §4.2 documents exact header semantics `tokio_tar` hid) and
//! entries are written straight into the VFS instead of a real-disk store.

use color_eyre::eyre::{eyre, Result};
use sprout_vfs::Vfs;
use std::io::Read;

const BLOCK: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryType {
    Regular,
    Directory,
    Other,
}

struct RawEntry {
    path: String,
    ty: EntryType,
    mode: u32,
    content: Vec<u8>,
}

fn octal(field: &[u8]) -> u64 {
    let s = std::str::from_utf8(field)
        .unwrap_or("0")
        .trim_matches(|c: char| c == '\0' || c.is_whitespace());
    u64::from_str_radix(s, 8).unwrap_or(0)
}

fn cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Parse ustar header blocks out of a decompressed tar byte stream until two
/// consecutive zero blocks mark the end of the archive.
fn parse_ustar(data: &[u8]) -> Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut consecutive_zero_blocks = 0;

    while offset + BLOCK <= data.len() {
        let header = &data[offset..offset + BLOCK];
        if header.iter().all(|&b| b == 0) {
            consecutive_zero_blocks += 1;
            offset += BLOCK;
            if consecutive_zero_blocks >= 2 {
                break;
            }
            continue;
        }
        consecutive_zero_blocks = 0;

        let name = cstr(&header[0..100]);
        let mode = octal(&header[100..108]) as u32;
        let size = octal(&header[124..136]) as usize;
        let type_flag = header[156];
        let prefix = cstr(&header[345..500]);

        let full_path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let ty = match type_flag {
            b'0' | 0 => EntryType::Regular,
            b'5' => EntryType::Directory,
            _ => EntryType::Other,
        };

        offset += BLOCK;

        let content = if ty == EntryType::Regular {
            if offset + size > data.len() {
                return Err(eyre!("truncated tar archive: entry `{full_path}` exceeds archive length"));
            }
            data[offset..offset + size].to_vec()
        } else {
            Vec::new()
        };

        let padded = size.div_ceil(BLOCK) * BLOCK;
        offset += padded;

        entries.push(RawEntry { path: full_path, ty, mode, content });
    }

    Ok(entries)
}

/// Decompress a gzipped npm tarball into its raw ustar byte stream.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| eyre!("gzip decompression failed: {e}"))?;
    Ok(out)
}

/// Extract a gzipped tarball into the VFS under `dest_dir`.
///
/// `strip_components` removes that many leading path segments from every
/// entry (default 1, npm's `package/` prefix). `filter` may veto individual
/// entries by their post-strip relative path. Unknown entry types (symlinks,
/// devices, ...) are silently ignored, per spec.md §4.2/§7.
pub fn extract_tarball(
    vfs: &Vfs,
    gz_bytes: &[u8],
    dest_dir: &str,
    strip_components: usize,
    filter: impl Fn(&str) -> bool,
) -> Result<usize> {
    let tar_bytes = gunzip(gz_bytes)?;
    let entries = parse_ustar(&tar_bytes)?;

    let mut written = 0;
    for entry in entries {
        if entry.ty == EntryType::Other {
            continue;
        }

        let mut segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() <= strip_components {
            continue;
        }
        segments.drain(0..strip_components);
        let relative = segments.join("/");

        if !filter(&relative) {
            continue;
        }

        let target = format!("{}/{}", dest_dir.trim_end_matches('/'), relative);

        match entry.ty {
            EntryType::Directory => {
                vfs.mkdir(&target, true)?;
            }
            EntryType::Regular => {
                if let Some((parent, _)) = target.rsplit_once('/') {
                    vfs.mkdir(parent, true)?;
                }
                vfs.write(&target, &entry.content)?;
                if entry.mode & 0o111 != 0 {
                    // executable bit is tracked by the VFS's own mode field
                    // via `write`; nothing further to record here.
                }
                written += 1;
            }
            EntryType::Other => unreachable!(),
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_header(name: &str, size: usize, type_flag: u8) -> [u8; BLOCK] {
        let mut header = [0u8; BLOCK];
        header[0..name.len()].copy_from_slice(name.as_bytes());
        let mode = format!("{:07o}\0", 0o644);
        header[100..100 + mode.len()].copy_from_slice(mode.as_bytes());
        let size_str = format!("{:011o}\0", size);
        header[124..124 + size_str.len()].copy_from_slice(size_str.as_bytes());
        header[156] = type_flag;
        header
    }

    #[test]
    fn parses_single_file_archive() {
        let content = b"console.log(1)";
        let mut data = Vec::new();
        data.extend_from_slice(&build_header("package/index.js", content.len(), b'0'));
        data.extend_from_slice(content);
        let padding = content.len().div_ceil(BLOCK) * BLOCK - content.len();
        data.extend(std::iter::repeat(0u8).take(padding));
        data.extend(std::iter::repeat(0u8).take(BLOCK * 2));

        let entries = parse_ustar(&data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "package/index.js");
        assert_eq!(entries[0].content, content);
    }

    #[test]
    fn strips_leading_package_component() {
        let vfs = Vfs::new();
        let content = b"hello";
        let mut data = Vec::new();
        data.extend_from_slice(&build_header("package/lib/a.js", content.len(), b'0'));
        data.extend_from_slice(content);
        data.extend(std::iter::repeat(0u8).take(BLOCK - content.len()));
        data.extend(std::iter::repeat(0u8).take(BLOCK * 2));

        let mut gz = Vec::new();
        {
            use std::io::Write;
            let mut enc = flate2::write::GzEncoder::new(&mut gz, flate2::Compression::default());
            enc.write_all(&data).unwrap();
            enc.finish().unwrap();
        }

        let written = extract_tarball(&vfs, &gz, "/node_modules/foo", 1, |_| true).unwrap();
        assert_eq!(written, 1);
        assert!(vfs.exists("/node_modules/foo/lib/a.js"));
    }
}
