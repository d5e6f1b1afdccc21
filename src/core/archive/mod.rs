// ─── Archive Handling ───
// Magic-byte format sniffing plus one extractor per supported container.
// The remote side serves either zip or rar archives; everything else is
// rejected before any extraction starts.

pub mod rar;
pub mod zip;

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::core::error::{ModpackError, ModpackResult};

use self::rar::RarExtractor;
use self::zip::ZipExtractor;

/// Local file header of every zip archive ("PK").
pub const ZIP_SIGNATURE: [u8; 2] = [0x50, 0x4B];
/// RAR 4.x/5.x marker block prefix ("Rar!" 0x1A 0x07).
pub const RAR_SIGNATURE: [u8; 6] = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Rar,
    Unknown,
}

/// Classify an archive header. Pure so tests can feed raw bytes.
pub fn detect_archive_type_bytes(header: &[u8]) -> ArchiveType {
    if header.len() >= RAR_SIGNATURE.len() && header[..RAR_SIGNATURE.len()] == RAR_SIGNATURE {
        ArchiveType::Rar
    } else if header.len() >= ZIP_SIGNATURE.len() && header[..ZIP_SIGNATURE.len()] == ZIP_SIGNATURE
    {
        ArchiveType::Zip
    } else {
        ArchiveType::Unknown
    }
}

/// Sniff the format of an archive on disk from its first bytes.
///
/// The file extension is deliberately ignored; remote hosts routinely
/// serve renamed archives.
pub async fn detect_archive_type(path: &Path) -> ModpackResult<ArchiveType> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ModpackError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut header = [0u8; 8];
    let mut filled = 0;
    while filled < header.len() {
        let read = file
            .read(&mut header[filled..])
            .await
            .map_err(|e| ModpackError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    let kind = detect_archive_type_bytes(&header[..filled]);
    debug!("Sniffed {:?} as {:?}", path, kind);
    Ok(kind)
}

#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract the whole archive under `dest`, creating it if needed.
    async fn extract(&self, archive: &Path, dest: &Path) -> ModpackResult<()>;
}

/// Dispatcher without Box<dyn>.
pub enum Extractor {
    Zip(ZipExtractor),
    Rar(RarExtractor),
}

impl Extractor {
    /// Pick the extractor for a sniffed archive type.
    pub fn for_archive_type(kind: ArchiveType, archive: &Path) -> ModpackResult<Self> {
        match kind {
            ArchiveType::Zip => Ok(Extractor::Zip(ZipExtractor)),
            ArchiveType::Rar => Ok(Extractor::Rar(RarExtractor)),
            ArchiveType::Unknown => Err(ModpackError::UnsupportedArchive {
                path: archive.to_path_buf(),
            }),
        }
    }

    pub async fn extract(&self, archive: &Path, dest: &Path) -> ModpackResult<()> {
        match self {
            Extractor::Zip(e) => e.extract(archive, dest).await,
            Extractor::Rar(e) => e.extract(archive, dest).await,
        }
    }
}
