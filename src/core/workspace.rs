// ─── Workspace ───
// Per-run scratch directory holding the downloaded archive and its
// extracted tree. Lives under the system temp dir, never inside the
// target, and disappears on every exit path: the pipeline closes it
// explicitly and the TempDir guard covers panics.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::fetch;

const EXTRACT_DIR: &str = "extract";

pub struct Workspace {
    dir: TempDir,
    archive_path: PathBuf,
    extract_dir: PathBuf,
}

impl Workspace {
    /// Allocate a fresh scratch directory for one pipeline run.
    pub fn create(archive_url: &str) -> ModpackResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("packhaul-")
            .tempdir()
            .map_err(|e| ModpackError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;

        let archive_path = dir.path().join(archive_file_name(archive_url));
        let extract_dir = dir.path().join(EXTRACT_DIR);
        std::fs::create_dir_all(&extract_dir).map_err(|e| ModpackError::Io {
            path: extract_dir.clone(),
            source: e,
        })?;

        debug!("Created workspace {:?}", dir.path());
        Ok(Self {
            dir,
            archive_path,
            extract_dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded archive lands.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Where the archive gets extracted.
    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    /// Remove the scratch directory, logging rather than raising failures;
    /// cleanup problems must never mask the pipeline outcome.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {:?}: {}", path, e);
        } else {
            debug!("Removed workspace {:?}", path);
        }
    }
}

/// Local file name for the downloaded archive, guessed from the URL.
/// Defaults to rar, matching what the pack host usually serves.
fn archive_file_name(url: &str) -> &'static str {
    if fetch::looks_like_zip(url) {
        "modpack.zip"
    } else {
        "modpack.rar"
    }
}
