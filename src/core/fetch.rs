// ─── Archive Fetch ───
// Streaming download of the pack archive with on-the-fly digest
// computation and an optional structural sanity check for zip files.

use std::path::Path;

use futures_util::StreamExt;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{ModpackError, ModpackResult};

/// Digest algorithms the manifest may declare for the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "SHA-1",
            ChecksumAlgorithm::Sha256 => "SHA-256",
        }
    }
}

/// Expected digest for a downloaded archive.
#[derive(Debug, Clone)]
pub struct IntegrityCheck {
    pub algorithm: ChecksumAlgorithm,
    pub expected: String,
}

impl IntegrityCheck {
    pub fn sha1(expected: &str) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha1,
            expected: expected.to_string(),
        }
    }

    pub fn sha256(expected: &str) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            expected: expected.to_string(),
        }
    }
}

enum ArchiveHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl ArchiveHasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha1 => ArchiveHasher::Sha1(Sha1::new()),
            ChecksumAlgorithm::Sha256 => ArchiveHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            ArchiveHasher::Sha1(h) => h.update(chunk),
            ArchiveHasher::Sha256(h) => h.update(chunk),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            ArchiveHasher::Sha1(h) => hex::encode(h.finalize()),
            ArchiveHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Whether a URL or file name plausibly refers to a zip archive.
pub fn looks_like_zip(url_or_name: &str) -> bool {
    url_or_name.to_ascii_lowercase().contains(".zip")
}

/// Download `url` into `dest`, streaming to disk while hashing.
///
/// Rejects non-2xx responses before writing completes the pipeline. When
/// `integrity` is given, a digest mismatch fails the whole run before any
/// extraction happens. `verify_zip` additionally walks the central
/// directory of the downloaded file to catch truncated zips early.
pub async fn fetch_archive(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    integrity: Option<&IntegrityCheck>,
    verify_zip: bool,
) -> ModpackResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ModpackError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ModpackError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total_bytes = response.content_length();
    info!("Downloading archive {} ({:?} bytes)", url, total_bytes);

    let mut hasher = integrity.map(|check| ArchiveHasher::new(check.algorithm));
    let mut downloaded: u64 = 0;

    // Write inside a block so the handle is dropped before verification.
    {
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ModpackError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            file.write_all(&chunk).await.map_err(|e| ModpackError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| ModpackError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        // file is dropped here — critical on Windows
    }

    debug!("Downloaded {} bytes to {:?}", downloaded, dest);

    if let (Some(hasher), Some(check)) = (hasher, integrity) {
        let actual = hasher.finalize_hex();
        if !actual.eq_ignore_ascii_case(check.expected.trim()) {
            return Err(ModpackError::ChecksumMismatch {
                algorithm: check.algorithm.name().to_string(),
                path: dest.to_path_buf(),
                expected: check.expected.clone(),
                actual,
            });
        }
        debug!("{} digest verified for {:?}", check.algorithm.name(), dest);
    }

    if verify_zip {
        let path = dest.to_path_buf();
        tokio::task::spawn_blocking(move || verify_zip_structure(&path))
            .await
            .map_err(|e| ModpackError::Other(format!("zip verification task failed: {e}")))??;
    }

    Ok(())
}

/// Open the file as a zip archive and touch every entry header.
///
/// Catches truncated downloads and HTML error pages saved under a `.zip`
/// name before extraction starts writing into the workspace.
pub fn verify_zip_structure(path: &Path) -> ModpackResult<()> {
    let file = std::fs::File::open(path).map_err(|e| ModpackError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| ModpackError::ZipStructure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    for index in 0..archive.len() {
        archive
            .by_index(index)
            .map_err(|e| ModpackError::ZipStructure {
                path: path.to_path_buf(),
                reason: format!("entry {index}: {e}"),
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn hasher_matches_known_digests() {
        let mut sha1 = ArchiveHasher::new(ChecksumAlgorithm::Sha1);
        sha1.update(b"hello");
        assert_eq!(
            sha1.finalize_hex(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );

        let mut sha256 = ArchiveHasher::new(ChecksumAlgorithm::Sha256);
        sha256.update(b"hello");
        assert_eq!(
            sha256.finalize_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn zip_name_detection() {
        assert!(looks_like_zip("https://example.com/pack.zip"));
        assert!(looks_like_zip("https://example.com/Pack.ZIP?key=1"));
        assert!(looks_like_zip("modpack.zip"));
        assert!(!looks_like_zip("https://example.com/pack.rar"));
        assert!(!looks_like_zip("modpack.rar"));
    }

    #[test]
    fn structure_check_accepts_valid_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.zip");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("mods/a.jar", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"jar bytes").unwrap();
            writer.finish().unwrap();
        }
        assert!(verify_zip_structure(&path).is_ok());
    }

    #[test]
    fn structure_check_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.zip");
        std::fs::write(&path, b"<html>not a zip</html>").unwrap();
        let err = verify_zip_structure(&path).unwrap_err();
        assert!(matches!(err, ModpackError::ZipStructure { .. }));
    }
}
