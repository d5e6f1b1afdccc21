use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire provisioning backend.
/// Every module returns `Result<T, ModpackError>`.
#[derive(Debug, Error)]
pub enum ModpackError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Could not resolve download URL {url}: {reason}")]
    UrlResolution { url: String, reason: String },

    // ── Integrity ───────────────────────────────────────
    #[error("{algorithm} mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Zip structure check failed for {path:?}: {reason}")]
    ZipStructure { path: PathBuf, reason: String },

    // ── Archive ─────────────────────────────────────────
    #[error("Unsupported archive format: {path:?}")]
    UnsupportedArchive { path: PathBuf },

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("RAR extraction error: {0}")]
    Rar(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Control flow ────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type ModpackResult<T> = Result<T, ModpackError>;

impl From<std::io::Error> for ModpackError {
    fn from(source: std::io::Error) -> Self {
        ModpackError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
