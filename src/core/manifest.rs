// ─── Modpack Manifest ───
// Remote pack descriptor: version, archive checksum and the list of
// directories managed during selective updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::error::{ModpackError, ModpackResult};

const MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote pack descriptor. All fields are optional; a missing or broken
/// manifest never blocks provisioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackManifest {
    pub version: Option<String>,
    /// Upstream timestamp, carried as an opaque string into the marker.
    pub updated_at: Option<String>,
    /// SHA-256 hex digest of the pack archive.
    pub checksum: Option<String>,
    /// Top-level directories the pack manages during updates.
    pub directories: Option<Vec<String>>,
}

/// Fetch and parse the manifest, tolerating every failure.
///
/// A blank URL skips the network entirely. Transport and parse errors are
/// logged and collapse to `None`; callers fall back to built-in defaults.
pub async fn load_manifest(client: &reqwest::Client, url: &str) -> Option<ModpackManifest> {
    if url.trim().is_empty() {
        debug!("No manifest URL configured, using defaults");
        return None;
    }

    match fetch_manifest(client, url).await {
        Ok(manifest) => {
            info!(
                "Loaded modpack manifest from {} (version {:?})",
                url, manifest.version
            );
            Some(manifest)
        }
        Err(e) => {
            warn!("Manifest unavailable at {}: {} (using defaults)", url, e);
            None
        }
    }
}

async fn fetch_manifest(client: &reqwest::Client, url: &str) -> ModpackResult<ModpackManifest> {
    let response = client
        .get(url)
        .timeout(MANIFEST_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ModpackError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let manifest = response.json().await?;
    Ok(manifest)
}

// ── Cached refresh service ──────────────────────────────

/// Keeps the latest manifest in a watch channel and refreshes it in the
/// background. Concurrent refresh requests collapse into one: a refresh
/// arriving while another is in flight is dropped, not queued.
pub struct ManifestService {
    inner: Arc<ManifestInner>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

struct ManifestInner {
    client: reqwest::Client,
    url: String,
    refreshing: AtomicBool,
    latest: watch::Sender<Option<ModpackManifest>>,
}

impl ManifestService {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(ManifestInner {
                client,
                url: url.into(),
                refreshing: AtomicBool::new(false),
                latest,
            }),
            ticker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ModpackManifest>> {
        self.inner.latest.subscribe()
    }

    /// Last successfully loaded manifest, if any.
    pub fn latest(&self) -> Option<ModpackManifest> {
        self.inner.latest.borrow().clone()
    }

    /// Refresh once. A refresh already in flight makes this a no-op.
    pub async fn refresh_now(&self) {
        self.inner.refresh().await;
    }

    /// Spawn a background task refreshing every `period`. The first tick
    /// fires immediately. Calling again replaces the previous task.
    pub fn start_periodic_refresh(&self, period: Duration) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                inner.refresh().await;
            }
        });

        if let Some(old) = self.ticker_slot().replace(handle) {
            old.abort();
        }
    }

    /// Stop the background refresh task.
    pub fn close(&self) {
        if let Some(handle) = self.ticker_slot().take() {
            handle.abort();
        }
    }

    fn ticker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ManifestService {
    fn drop(&mut self) {
        self.close();
    }
}

impl ManifestInner {
    async fn refresh(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Manifest refresh already in flight, skipping");
            return;
        }

        if let Some(manifest) = load_manifest(&self.client, &self.url).await {
            self.latest.send_replace(Some(manifest));
        }

        self.refreshing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_manifest() {
        let json = r#"{
            "version": "3.2.0",
            "updatedAt": "2024-06-01T12:00:00Z",
            "checksum": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            "directories": ["mods", "config/overrides"]
        }"#;
        let manifest: ModpackManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.version.as_deref(), Some("3.2.0"));
        assert_eq!(manifest.updated_at.as_deref(), Some("2024-06-01T12:00:00Z"));
        assert_eq!(
            manifest.directories,
            Some(vec!["mods".to_string(), "config/overrides".to_string()])
        );
    }

    #[test]
    fn deserialize_empty_manifest() {
        let manifest: ModpackManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.version.is_none());
        assert!(manifest.updated_at.is_none());
        assert!(manifest.checksum.is_none());
        assert!(manifest.directories.is_none());
    }

    #[tokio::test]
    async fn blank_url_skips_network() {
        let client = reqwest::Client::new();
        assert!(load_manifest(&client, "").await.is_none());
        assert!(load_manifest(&client, "   ").await.is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_latest_unchanged() {
        let service = ManifestService::new(reqwest::Client::new(), "");
        assert!(service.latest().is_none());
        service.refresh_now().await;
        assert!(service.latest().is_none());
        service.close();
    }
}
