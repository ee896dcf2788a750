//! Registry client (spec.md §4.2/§6).
//!
//! Grounded on Cotton's `util::CLIENT`/retry pattern, reconstructed from its
//! call sites in `plan.rs`/`commands/install.rs` — the original `util.rs`/
//! `npm.rs` files were not kept by the retrieval pack.

use std::sync::LazyLock;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use dashmap::DashMap;
use reqwest::{Client, StatusCode};

use crate::config::{client_auth, find_auth_for, read_config};
use crate::package::RegistryManifest;

/// Maximum number of concurrent in-flight registry/tarball requests
/// (spec.md §5: "batch of at most 6 concurrent in-flight requests").
pub const CLIENT_LIMIT: usize = 6;

pub static CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .user_agent(concat!("sprout-pm/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .build()
        .expect("failed to build reqwest client")
});

/// Retry a fallible async operation a fixed number of times with a short
/// backoff, matching the teacher's `retry` helper.
pub async fn retry<T, F, Fut>(mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..3 {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                tracing::debug!("attempt {attempt} failed: {e}");
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
            }
        }
    }
    Err(last_err.unwrap())
}

/// Percent-encode a scoped package name's `/` as `%2f`, per spec.md §6.
fn encode_name(name: &str) -> String {
    name.replace('/', "%2f")
}

/// Caches manifests by name for the session (spec.md §4.2).
pub struct Registry {
    base_url: String,
    cache: DashMap<String, RegistryManifest>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new("https://registry.npmjs.org".to_string())
    }
}

impl Registry {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            cache: DashMap::new(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_manifest(&self, name: &str) -> Result<RegistryManifest> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        let url = format!("{}/{}", self.base_url, encode_name(name));
        let config = read_config().await?;
        let auth = find_auth_for(&config, &url);

        let manifest = retry(|| async {
            let builder = CLIENT.get(&url).header(
                "Accept",
                "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8",
            );
            let builder = client_auth(builder, auth)?;
            let res = builder.send().await?;

            if res.status() == StatusCode::NOT_FOUND {
                return Err(eyre!("package `{name}` not found in registry"));
            }
            let res = res.error_for_status()?;
            let manifest: RegistryManifest = res.json().await?;
            Ok(manifest)
        })
        .await?;

        self.cache.insert(name.to_string(), manifest.clone());
        Ok(manifest)
    }

    /// Download the raw, still-gzipped tarball bytes for a resolved
    /// dependency's `dist.tarball` URL.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_tarball(&self, tarball_url: &str) -> Result<bytes_compat::Bytes> {
        let config = read_config().await?;
        let auth = find_auth_for(&config, tarball_url);

        retry(|| async {
            let builder = CLIENT.get(tarball_url);
            let builder = client_auth(builder, auth)?;
            let res = builder.send().await?.error_for_status()?;
            Ok(bytes_compat::Bytes(res.bytes().await?.to_vec()))
        })
        .await
    }
}

/// `reqwest::bytes::Bytes` pulls in the `bytes` crate transitively; this
/// workspace doesn't take a direct dependency on it (see DESIGN.md's
/// `modules::fetch` notes), so tarball bytes are re-exposed as a plain
/// owned `Vec<u8>` wrapper instead of threading a new direct dependency
/// through for one call site.
pub mod bytes_compat {
    #[derive(Debug, Clone)]
    pub struct Bytes(pub Vec<u8>);

    impl std::ops::Deref for Bytes {
        type Target = [u8];
        fn deref(&self) -> &[u8] {
            &self.0
        }
    }
}
