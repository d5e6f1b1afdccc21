// ─── Install Marker ───
// A small JSON document inside the target directory recording what was
// provisioned and when. Its presence is the only "this directory is
// managed by us" signal the rest of the launcher relies on.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::ModpackManifest;

pub const MARKER_DIR: &str = ".packhaul";
pub const MARKER_FILE: &str = "installed.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMarker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub zip_url: String,
    pub manifest_url: String,
    pub installed_at: DateTime<Utc>,
}

pub fn marker_path(target: &Path) -> PathBuf {
    target.join(MARKER_DIR).join(MARKER_FILE)
}

/// Whether the target directory already carries a completed install.
pub fn is_installed(target: &Path) -> bool {
    marker_path(target).is_file()
}

/// Read the marker back, tolerating its absence.
pub async fn read_marker(target: &Path) -> ModpackResult<Option<InstallMarker>> {
    let path = marker_path(target);
    let json = match tokio::fs::read_to_string(&path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ModpackError::Io {
                path,
                source: e,
            })
        }
    };
    let marker: InstallMarker = serde_json::from_str(&json)?;
    Ok(Some(marker))
}

/// Write the marker after a fully successful run.
///
/// Goes through a sibling temp file plus rename, so a crash mid-write
/// never leaves a torn marker behind.
pub async fn write_marker(
    target: &Path,
    manifest: Option<&ModpackManifest>,
    zip_url: &str,
    manifest_url: &str,
) -> ModpackResult<()> {
    let marker = InstallMarker {
        version: manifest.and_then(|m| m.version.clone()),
        updated_at: manifest.and_then(|m| m.updated_at.clone()),
        zip_url: zip_url.to_string(),
        manifest_url: manifest_url.to_string(),
        installed_at: Utc::now(),
    };

    let path = marker_path(target);
    let dir = target.join(MARKER_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ModpackError::Io {
            path: dir,
            source: e,
        })?;

    let json = serde_json::to_string_pretty(&marker)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json)
        .await
        .map_err(|e| ModpackError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;

    // rename replaces an existing marker in one step on Unix and Windows
    // alike, so the previous marker stays intact until the new one lands.
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| ModpackError::Io {
            path: path.clone(),
            source: e,
        })?;

    info!("Wrote install marker {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_roundtrip_with_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ModpackManifest {
            version: Some("3.2.0".into()),
            updated_at: Some("2024-06-01T12:00:00Z".into()),
            ..Default::default()
        };

        assert!(!is_installed(dir.path()));
        write_marker(
            dir.path(),
            Some(&manifest),
            "https://example.com/pack.zip",
            "https://example.com/manifest.json",
        )
        .await
        .unwrap();

        assert!(is_installed(dir.path()));
        let marker = read_marker(dir.path()).await.unwrap().unwrap();
        assert_eq!(marker.version.as_deref(), Some("3.2.0"));
        assert_eq!(marker.updated_at.as_deref(), Some("2024-06-01T12:00:00Z"));
        assert_eq!(marker.zip_url, "https://example.com/pack.zip");
        assert_eq!(marker.manifest_url, "https://example.com/manifest.json");
    }

    #[tokio::test]
    async fn marker_json_uses_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), None, "zip", "manifest").await.unwrap();

        let raw = std::fs::read_to_string(marker_path(dir.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["zipUrl"], "zip");
        assert_eq!(value["manifestUrl"], "manifest");
        assert!(value.get("installedAt").is_some());
        // Absent manifest fields are omitted entirely.
        assert!(value.get("version").is_none());
        assert!(value.get("updatedAt").is_none());
    }

    #[tokio::test]
    async fn rewrite_replaces_existing_marker() {
        let dir = tempfile::tempdir().unwrap();
        write_marker(dir.path(), None, "first", "m").await.unwrap();
        write_marker(dir.path(), None, "second", "m").await.unwrap();

        let marker = read_marker(dir.path()).await.unwrap().unwrap();
        assert_eq!(marker.zip_url, "second");
        // The temp file was renamed into place, not left beside the marker.
        let tmp = marker_path(dir.path()).with_extension("json.tmp");
        assert!(!tmp.exists());
        assert!(is_installed(dir.path()));
    }

    #[tokio::test]
    async fn missing_marker_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_marker(dir.path()).await.unwrap().is_none());
    }
}
