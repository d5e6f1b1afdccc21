use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use unrar::Archive;

use crate::core::error::{ModpackError, ModpackResult};

use super::ArchiveExtractor;

pub struct RarExtractor;

#[async_trait]
impl ArchiveExtractor for RarExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> ModpackResult<()> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_rar(&archive, &dest))
            .await
            .map_err(|e| ModpackError::Other(format!("rar extraction task failed: {e}")))?
    }
}

fn extract_rar(rar_path: &Path, dest: &Path) -> ModpackResult<()> {
    std::fs::create_dir_all(dest).map_err(|e| ModpackError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut skipped = 0usize;
    let mut archive = Archive::new(rar_path)
        .open_for_processing()
        .map_err(|e| ModpackError::Rar(e.to_string()))?;

    while let Some(header) = archive
        .read_header()
        .map_err(|e| ModpackError::Rar(e.to_string()))?
    {
        let raw_name = header.entry().filename.clone();
        let is_dir = header.entry().is_directory();

        let rel_path = match sanitize_entry_path(&raw_name) {
            Some(path) => path,
            None => {
                warn!("Skipping rar entry with unsafe path: {:?}", raw_name);
                skipped += 1;
                archive = header
                    .skip()
                    .map_err(|e| ModpackError::Rar(e.to_string()))?;
                continue;
            }
        };

        let out_path = dest.join(&rel_path);
        if is_dir {
            std::fs::create_dir_all(&out_path).map_err(|e| ModpackError::Io {
                path: out_path,
                source: e,
            })?;
            archive = header
                .skip()
                .map_err(|e| ModpackError::Rar(e.to_string()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModpackError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Streams the entry straight to disk; large pack files never sit
        // fully in memory.
        archive = header
            .extract_to(&out_path)
            .map_err(|e| ModpackError::Rar(e.to_string()))?;
    }

    if skipped > 0 {
        warn!("Skipped {} unsafe entries in {:?}", skipped, rar_path);
    }
    debug!("Extracted {:?} into {:?}", rar_path, dest);
    Ok(())
}

/// Normalize an archive entry name into a path safe to join under the
/// extraction root.
///
/// Backslashes count as separators regardless of platform. Absolute
/// names, names that climb above the root through `..`, and names with
/// non-plain components (drive prefixes) all come back as `None`.
fn sanitize_entry_path(raw: &Path) -> Option<PathBuf> {
    let normalized = raw.to_string_lossy().replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            _ => parts.push(part),
        }
    }

    let mut result = PathBuf::new();
    for part in parts {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => result.push(part),
            _ => return None,
        }
    }

    if result.as_os_str().is_empty() {
        return None;
    }
    Some(result)
}
