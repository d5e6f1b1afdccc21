// ─── Provisioning Pipeline ───
// Composes the whole run as a chain of named stages:
//
//   Resolve → Download → Extract → Sync → Marker
//
// Each stage is awaited in dependency order; any failure aborts the rest.
// The workspace is created up front and closed after the chain finishes,
// success or failure. Cancellation is cooperative: the flag is checked
// between stages, a stage already running finishes its work.
//
// Nothing here takes a lock on the target directory; two pipelines
// pointed at the same target will race each other.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::archive::{self, Extractor};
use crate::core::error::{ModpackError, ModpackResult};
use crate::core::fetch::{self, IntegrityCheck};
use crate::core::layout;
use crate::core::manifest::ModpackManifest;
use crate::core::marker;
use crate::core::progress::EventSender;
use crate::core::resolver;
use crate::core::sync::{self, SyncMode};
use crate::core::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Resolve,
    Download,
    Extract,
    Sync,
    Marker,
}

/// Everything one run needs, passed in explicitly so runs stay
/// independently testable. The manifest is pre-loaded by the caller
/// (see `manifest::load_manifest`); its absence is not an error.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub target_dir: PathBuf,
    pub archive_url: String,
    pub manifest_url: String,
    pub manifest: Option<ModpackManifest>,
}

/// Shared cancellation flag checked before each stage.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ModpackService {
    client: reqwest::Client,
}

impl ModpackService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fresh install: full copy of the pack into the target directory.
    pub async fn install(
        &self,
        request: &InstallRequest,
        events: &EventSender,
        cancel: &CancelFlag,
    ) -> ModpackResult<()> {
        self.run(request, SyncMode::Install, events, cancel).await
    }

    /// Selective update: merge only the managed directories, preserving
    /// user data.
    pub async fn update(
        &self,
        request: &InstallRequest,
        events: &EventSender,
        cancel: &CancelFlag,
    ) -> ModpackResult<()> {
        self.run(request, SyncMode::Update, events, cancel).await
    }

    async fn run(
        &self,
        request: &InstallRequest,
        mode: SyncMode,
        events: &EventSender,
        cancel: &CancelFlag,
    ) -> ModpackResult<()> {
        info!(
            "Starting modpack {} for {:?}",
            mode.label(),
            request.target_dir
        );

        let workspace = Workspace::create(&request.archive_url)?;
        let outcome = self
            .run_stages(request, mode, &workspace, events, cancel)
            .await;
        // Scratch space goes away no matter how the stages ended.
        workspace.close();

        match &outcome {
            Ok(()) => info!(
                "Modpack {} finished for {:?}",
                mode.label(),
                request.target_dir
            ),
            Err(e) => warn!("Modpack {} failed: {}", mode.label(), e),
        }
        outcome
    }

    async fn run_stages(
        &self,
        request: &InstallRequest,
        mode: SyncMode,
        workspace: &Workspace,
        events: &EventSender,
        cancel: &CancelFlag,
    ) -> ModpackResult<()> {
        ensure_active(cancel)?;
        events.stage_started(PipelineStage::Resolve);
        let resolved = resolver::resolve_download_url(&self.client, &request.archive_url).await?;
        let download_url = if resolved.trim().is_empty() {
            request.archive_url.clone()
        } else {
            resolved
        };

        ensure_active(cancel)?;
        events.stage_started(PipelineStage::Download);
        let integrity = request
            .manifest
            .as_ref()
            .and_then(|m| m.checksum.as_deref())
            .map(str::trim)
            .filter(|checksum| !checksum.is_empty())
            .map(IntegrityCheck::sha256);
        let verify_zip =
            fetch::looks_like_zip(&download_url) || fetch::looks_like_zip(&request.archive_url);
        fetch::fetch_archive(
            &self.client,
            &download_url,
            workspace.archive_path(),
            integrity.as_ref(),
            verify_zip,
        )
        .await?;

        ensure_active(cancel)?;
        events.stage_started(PipelineStage::Extract);
        let kind = archive::detect_archive_type(workspace.archive_path()).await?;
        debug!("Archive type for this run: {:?}", kind);
        let extractor = Extractor::for_archive_type(kind, workspace.archive_path())?;
        extractor
            .extract(workspace.archive_path(), workspace.extract_dir())
            .await?;

        ensure_active(cancel)?;
        events.stage_started(PipelineStage::Sync);
        let content_root = layout::resolve_content_root(workspace.extract_dir()).await?;
        sync::synchronize(
            &content_root,
            &request.target_dir,
            mode,
            request.manifest.as_ref(),
            events,
        )
        .await?;

        // The marker only lands after a fully successful sync; a failed
        // run leaves any pre-existing marker untouched.
        ensure_active(cancel)?;
        events.stage_started(PipelineStage::Marker);
        marker::write_marker(
            &request.target_dir,
            request.manifest.as_ref(),
            &request.archive_url,
            &request.manifest_url,
        )
        .await?;

        Ok(())
    }
}

fn ensure_active(cancel: &CancelFlag) -> ModpackResult<()> {
    if cancel.is_cancelled() {
        return Err(ModpackError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_roundtrip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn stage_names_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(PipelineStage::Resolve).unwrap(),
            "resolve"
        );
        assert_eq!(
            serde_json::to_value(PipelineStage::Download).unwrap(),
            "download"
        );
        assert_eq!(
            serde_json::to_value(PipelineStage::Marker).unwrap(),
            "marker"
        );
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_first_stage() {
        let service = ModpackService::new(reqwest::Client::new());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let dir = tempfile::tempdir().unwrap();
        let request = InstallRequest {
            target_dir: dir.path().to_path_buf(),
            archive_url: "https://example.invalid/pack.zip".into(),
            manifest_url: String::new(),
            manifest: None,
        };

        let err = service
            .install(&request, &EventSender::disabled(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ModpackError::Cancelled));
        assert!(!marker::is_installed(dir.path()));
    }
}
