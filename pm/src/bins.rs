//! `.bin` wrapper generation (spec.md §4.2 step 5, §6 filesystem layout).
//!
//! Mirrors the teacher's `commands::install_package`/`setup_bins` shape,
//! adapted to write into the VFS as plain text shims instead of real
//! symlinks/junctions — nothing in this sandbox has a real process tree to
//! exec against (see DESIGN.md's note on Cotton's dropped shell deps).

use color_eyre::eyre::Result;
use sprout_vfs::Vfs;

use crate::resolver::DependencyTree;

/// Content of a `node_modules/.bin/<command>` shim: a single line invoking
/// the target through the command runner, as spec.md §4.2 step 5 requires.
fn shim_content(package_name: &str, script_relative_path: &str) -> String {
    format!(
        "#!/usr/bin/env sprout\n# autogenerated bin shim for `{package_name}`\nexec sprout run-script \"../{package_name}/{script_relative_path}\" \"$@\"\n"
    )
}

/// Walk every resolved package in `trees` and write a shim for each `bin`
/// entry into `<root>/node_modules/.bin/<command>`.
pub fn write_bin_shims(vfs: &Vfs, root: &str, trees: &[DependencyTree]) -> Result<usize> {
    let bin_dir = format!("{root}/node_modules/.bin");
    vfs.mkdir(&bin_dir, true)?;

    let mut count = 0;
    let mut stack: Vec<&DependencyTree> = trees.iter().collect();
    while let Some(tree) = stack.pop() {
        for (cmd, script_path) in tree.root.bin.entries(&tree.root.name) {
            let shim_path = format!("{bin_dir}/{cmd}");
            vfs.write(shim_path.as_str(), shim_content(&tree.root.name, &script_path).as_bytes())?;
            count += 1;
        }
        stack.extend(tree.children.values());
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{BinField, Dist};
    use crate::resolver::Dependency;
    use rustc_hash::FxHashMap;

    #[test]
    fn writes_one_shim_per_bin_entry() {
        let vfs = Vfs::new();
        let dep = Dependency {
            name: "left-pad".into(),
            version: "1.0.0".parse().unwrap(),
            dist: Dist { tarball: "http://x".into(), shasum: None },
            dependencies: Default::default(),
            bin: BinField::Single("bin/cli.js".into()),
        };
        let tree = DependencyTree { root: dep, children: FxHashMap::default() };

        let count = write_bin_shims(&vfs, "", &[tree]).unwrap();
        assert_eq!(count, 1);
        assert!(vfs.exists("/node_modules/.bin/left-pad"));
    }
}
