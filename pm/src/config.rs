//! Installer configuration: `.sproutrc` / `sprout.toml`.
//!
//! Referenced but not present in the retrieval pack; reconstructed from its
//! callers (`read_config().await?.registry`, `.disallow_install_scripts`) in
//! `plan.rs`/`commands/install.rs`. Loaded once per process via `OnceCell`,
//! the same caching shape the teacher used for its other session-scoped
//! state (`CLIENT`, manifest caches).

use color_eyre::eyre::Result;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryAuth {
    pub url: String,
    #[serde(default)]
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry base URL, default `https://registry.npmjs.org`.
    pub registry_url: String,
    /// Per-registry auth tokens, matched by URL prefix against a dependency's
    /// tarball URL.
    pub registry: Vec<RegistryAuth>,
    /// When true, lifecycle scripts (`preinstall`/`install`/`postinstall`)
    /// are skipped and a warning is logged instead of executed.
    pub disallow_install_scripts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: "https://registry.npmjs.org".to_string(),
            registry: Vec::new(),
            disallow_install_scripts: true,
        }
    }
}

static CONFIG: OnceCell<Config> = OnceCell::const_new();

async fn load_config() -> Config {
    for candidate in [".sproutrc", "sprout.toml"] {
        if let Ok(text) = tokio::fs::read_to_string(candidate).await {
            match toml::from_str::<Config>(&text) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("failed to parse {candidate}: {e}");
                }
            }
        }
    }
    Config::default()
}

/// Read the session-cached configuration, loading it from disk on first use.
pub async fn read_config() -> Result<Config> {
    Ok(CONFIG.get_or_init(load_config).await.clone())
}

/// Apply bearer auth to a registry request if a matching token is configured.
pub fn client_auth(
    builder: RequestBuilder,
    auth: Option<&RegistryAuth>,
) -> Result<RequestBuilder> {
    Ok(match auth.and_then(|a| a.auth.as_deref()) {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    })
}

/// Resolve a registry auth entry whose `url` prefixes `tarball_url`.
pub fn find_auth_for<'a>(config: &'a Config, tarball_url: &str) -> Option<&'a RegistryAuth> {
    config.registry.iter().find(|r| tarball_url.starts_with(&r.url))
}
