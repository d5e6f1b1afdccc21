// ─── Content Root Discovery ───
// Pack authors often wrap the payload in a single top-level directory
// ("MyPack-1.2/mods/..."). Synchronization wants the directory whose
// children are the game folders, so a lone wrapper that contains a known
// payload marker is unwrapped one level.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{ModpackError, ModpackResult};

const PACK_ROOT_MARKERS: [&str; 4] = ["mods", "config", "versions", "minecraft"];

/// Find the directory actually holding the pack payload.
///
/// Descends exactly one level, and only when the extraction root has a
/// single child, that child is a directory, and it contains at least one
/// payload marker directory. Everything else keeps the extraction root.
pub async fn resolve_content_root(extract_dir: &Path) -> ModpackResult<PathBuf> {
    let mut entries = tokio::fs::read_dir(extract_dir)
        .await
        .map_err(|e| ModpackError::Io {
            path: extract_dir.to_path_buf(),
            source: e,
        })?;

    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| ModpackError::Io {
        path: extract_dir.to_path_buf(),
        source: e,
    })? {
        children.push(entry.path());
    }

    if children.len() == 1 {
        let only = &children[0];
        if only.is_dir() && looks_like_pack_root(only) {
            debug!("Unwrapping single wrapper directory {:?}", only);
            return Ok(only.clone());
        }
    }

    Ok(extract_dir.to_path_buf())
}

fn looks_like_pack_root(dir: &Path) -> bool {
    PACK_ROOT_MARKERS
        .iter()
        .any(|marker| dir.join(marker).is_dir())
}
