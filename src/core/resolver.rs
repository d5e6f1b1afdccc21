// ─── Download URL Resolver ───
// Some hosts publish share links instead of direct download URLs. Yandex
// Disk links go through the public cloud API to obtain the real `href`;
// everything else passes through untouched.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::error::{ModpackError, ModpackResult};

const YANDEX_RESOLVE_ENDPOINT: &str =
    "https://cloud-api.yandex.net/v1/disk/public/resources/download";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Whether a URL points at a Yandex Disk share.
pub fn is_yandex_disk_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("disk.yandex.") || lower.contains("yadi.sk")
}

/// Resolve an indirect share link into a direct download URL.
///
/// Blank and non-Yandex URLs come back unchanged without touching the
/// network. A Yandex API response without an `href` falls back to the
/// original URL; transport failures are fatal because the download that
/// follows cannot succeed either.
pub async fn resolve_download_url(client: &reqwest::Client, url: &str) -> ModpackResult<String> {
    if url.trim().is_empty() || !is_yandex_disk_url(url) {
        return Ok(url.to_string());
    }

    debug!("Resolving Yandex Disk share link: {}", url);

    let response = client
        .get(YANDEX_RESOLVE_ENDPOINT)
        .query(&[("public_key", url)])
        .timeout(RESOLVE_TIMEOUT)
        .send()
        .await
        .map_err(|e| ModpackError::UrlResolution {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ModpackError::UrlResolution {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ModpackError::UrlResolution {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    match body.get("href").and_then(Value::as_str) {
        Some(href) if !href.trim().is_empty() => {
            info!("Resolved Yandex Disk link to direct download URL");
            Ok(href.to_string())
        }
        _ => {
            warn!("Yandex Disk response carried no href, keeping original URL");
            Ok(url.to_string())
        }
    }
}
