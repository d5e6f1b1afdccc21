use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::core::error::{ModpackError, ModpackResult};

use super::ArchiveExtractor;

pub struct ZipExtractor;

#[async_trait]
impl ArchiveExtractor for ZipExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> ModpackResult<()> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_zip(&archive, &dest))
            .await
            .map_err(|e| ModpackError::Other(format!("zip extraction task failed: {e}")))?
    }
}

fn extract_zip(zip_path: &Path, dest: &Path) -> ModpackResult<()> {
    let file = std::fs::File::open(zip_path).map_err(|e| ModpackError::Io {
        path: zip_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = ZipArchive::new(file)?;

    std::fs::create_dir_all(dest).map_err(|e| ModpackError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut skipped = 0usize;
    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;

        // Entries whose names escape the destination are dropped, not fatal;
        // one hostile entry must not abort the whole pack.
        let rel_path = match zipped.enclosed_name() {
            Some(path) => path,
            None => {
                warn!("Skipping zip entry with unsafe path: {}", zipped.name());
                skipped += 1;
                continue;
            }
        };

        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(rel_path);
        if zipped.name().ends_with('/') {
            std::fs::create_dir_all(&out_path).map_err(|e| ModpackError::Io {
                path: out_path,
                source: e,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModpackError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut out = std::fs::File::create(&out_path).map_err(|e| ModpackError::Io {
            path: out_path.clone(),
            source: e,
        })?;
        std::io::copy(&mut zipped, &mut out).map_err(|e| ModpackError::Io {
            path: out_path,
            source: e,
        })?;
    }

    if skipped > 0 {
        warn!("Skipped {} unsafe entries in {:?}", skipped, zip_path);
    }
    debug!("Extracted {:?} into {:?}", zip_path, dest);
    Ok(())
}
