//! Add command implementation.

use color_eyre::eyre::{ContextCompat, Result};
use compact_str::CompactString;
use futures::future::try_join_all;
use owo_colors::OwoColorize;
use serde_json::Value;
use sprout_vfs::Vfs;

use crate::package::{read_package_or_default, save_package};
use crate::progress::PROGRESS_BAR;
use crate::registry::Registry;

/// Execute the add command.
pub async fn cmd_add(vfs: &Vfs, cwd: &str, names: &[CompactString], dev: bool, pin: bool) -> Result<()> {
    if names.is_empty() {
        PROGRESS_BAR.suspend(|| println!("Note: no packages specified"));
    }

    add_packages(vfs, cwd, names, dev, pin).await
}

/// Add packages to `package.json`, pinning to the registry's `latest`
/// dist-tag (caret-pinned unless `pin` requests exact).
pub async fn add_packages(
    vfs: &Vfs,
    cwd: &str,
    names: &[CompactString],
    dev: bool,
    pin: bool,
) -> Result<()> {
    let mut package: Value = read_package_or_default(vfs, cwd).await?;
    let dependencies = package
        .as_object_mut()
        .wrap_err("`package.json` is invalid")?
        .entry(if dev { "devDependencies" } else { "dependencies" })
        .or_insert(Value::Object(Default::default()))
        .as_object_mut()
        .wrap_err("`package.json` contains non-object dependencies field")?;

    PROGRESS_BAR.set_message("Resolving packages".to_string());
    PROGRESS_BAR.set_length(names.len() as u64);

    let registry = Registry::default();

    for (name, manifest) in try_join_all(names.iter().map(|name| {
        let registry = &registry;
        async move {
            let x = registry.fetch_manifest(name).await.map(|res| (name, res));
            PROGRESS_BAR.inc(1);
            PROGRESS_BAR.set_message(format!("Resolved {name}"));
            x
        }
    }))
    .await?
    {
        let latest = manifest
            .dist_tags
            .get("latest")
            .wrap_err("Package `latest` tag not specified")?;

        let version = if pin { latest.to_string() } else { format!("^{latest}") };

        dependencies.insert(name.to_string(), Value::String(version.clone()));

        PROGRESS_BAR.suspend(|| println!("Added {} {}", name.to_string().yellow(), version.yellow()));
    }

    PROGRESS_BAR.finish_and_clear();
    save_package(vfs, cwd, &package).await?;

    Ok(())
}
