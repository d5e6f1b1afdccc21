// ─── Directory Synchronization ───
// Moves the extracted pack content into the player's game directory.
// INSTALL copies everything; UPDATE merges only the managed top-level
// directories and never touches user data (saves, logs, options.txt).
// Both modes are additive: files that vanished upstream are left alone.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::error::{ModpackError, ModpackResult};
use crate::core::manifest::ModpackManifest;
use crate::core::progress::EventSender;

/// Directories merged during UPDATE when the manifest declares none.
pub const DEFAULT_UPDATE_DIRS: [&str; 9] = [
    "mods",
    "config",
    "kubejs",
    "defaultconfigs",
    "resourcepacks",
    "shaderpacks",
    "shaders",
    "datapacks",
    "scripts",
];

/// Top-level entries UPDATE never writes, whatever the manifest says.
pub const PROTECTED_TOP_LEVEL: [&str; 5] =
    ["saves", "screenshots", "logs", "crash-reports", "options.txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Install,
    Update,
}

impl SyncMode {
    pub fn label(&self) -> &'static str {
        match self {
            SyncMode::Install => "install",
            SyncMode::Update => "update",
        }
    }
}

/// Derive the set of managed top-level directories for an update.
///
/// Manifest hints are normalized to their lower-cased first path segment;
/// blank hints are dropped. An empty result falls back to the defaults,
/// so the set is never empty.
pub fn allowed_top_level(manifest: Option<&ModpackManifest>) -> HashSet<String> {
    let mut allowed = HashSet::new();

    if let Some(hints) = manifest.and_then(|m| m.directories.as_ref()) {
        for hint in hints {
            if let Some(group) = normalize_top_level(hint) {
                allowed.insert(group);
            }
        }
    }

    if allowed.is_empty() {
        allowed.extend(DEFAULT_UPDATE_DIRS.iter().map(|s| s.to_string()));
    }
    allowed
}

/// Lower-cased first segment of a relative path, with separators
/// normalized and surrounding slashes stripped.
fn normalize_top_level(raw: &str) -> Option<String> {
    let cleaned = raw.trim().replace('\\', "/");
    let trimmed = cleaned.trim_matches('/');
    let first = trimmed.split('/').next().unwrap_or("");
    if first.is_empty() {
        None
    } else {
        Some(first.to_ascii_lowercase())
    }
}

/// Synchronize `content_root` into `target` according to `mode`.
pub async fn synchronize(
    content_root: &Path,
    target: &Path,
    mode: SyncMode,
    manifest: Option<&ModpackManifest>,
    events: &EventSender,
) -> ModpackResult<()> {
    match mode {
        SyncMode::Install => {
            let source = content_root.to_path_buf();
            let dest = target.to_path_buf();
            tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
                .await
                .map_err(|e| ModpackError::Other(format!("install copy task failed: {e}")))?
        }
        SyncMode::Update => {
            let source = content_root.to_path_buf();
            let dest = target.to_path_buf();
            let allowed = allowed_top_level(manifest);
            let events = events.clone();
            tokio::task::spawn_blocking(move || merge_managed(&source, &dest, &allowed, &events))
                .await
                .map_err(|e| ModpackError::Other(format!("update merge task failed: {e}")))?
        }
    }
}

// ── Install: full copy ──────────────────────────────────

fn copy_tree(source: &Path, dest: &Path) -> ModpackResult<()> {
    std::fs::create_dir_all(dest).map_err(|e| ModpackError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut copied = 0u64;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| walk_error(source, e))?;
        let rel = match entry.path().strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };

        let out_path = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| ModpackError::Io {
                path: out_path,
                source: e,
            })?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ModpackError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            std::fs::copy(entry.path(), &out_path).map_err(|e| ModpackError::Io {
                path: out_path,
                source: e,
            })?;
            copied += 1;
        }
    }

    info!("Installed {} files into {:?}", copied, dest);
    Ok(())
}

// ── Update: selective merge ─────────────────────────────

fn merge_managed(
    source: &Path,
    dest: &Path,
    allowed: &HashSet<String>,
    events: &EventSender,
) -> ModpackResult<()> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| walk_error(source, e))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let total = files.len();
    if total == 0 {
        // Observers still need to see a completed bar.
        events.sync_progress(1, 1);
        info!("Update found no files under {:?}", source);
        return Ok(());
    }

    let protected: HashSet<&str> = PROTECTED_TOP_LEVEL.iter().copied().collect();
    let mut copied = 0usize;
    let mut skipped = 0usize;

    for (index, path) in files.iter().enumerate() {
        // Progress counts enumerated files, filtered or not, so the bar
        // always reaches total.
        events.sync_progress(index + 1, total);

        let rel = match path.strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        let group = match normalize_top_level(&rel_str) {
            Some(group) => group,
            None => {
                skipped += 1;
                continue;
            }
        };

        if protected.contains(group.as_str()) {
            debug!("Skipping protected entry {}", rel_str);
            skipped += 1;
            continue;
        }
        if !allowed.contains(&group) {
            debug!("Skipping unmanaged entry {}", rel_str);
            skipped += 1;
            continue;
        }
        if rel_str.eq_ignore_ascii_case("options.txt") {
            debug!("Preserving user options.txt");
            skipped += 1;
            continue;
        }

        let out_path = dest.join(rel);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModpackError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::copy(path, &out_path).map_err(|e| ModpackError::Io {
            path: out_path,
            source: e,
        })?;
        copied += 1;
    }

    info!(
        "Update merged {} files into {:?} ({} skipped)",
        copied, dest, skipped
    );
    Ok(())
}

fn walk_error(root: &Path, e: walkdir::Error) -> ModpackError {
    let path = e
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    match e.into_io_error() {
        Some(source) => ModpackError::Io { path, source },
        None => ModpackError::Other(format!("walk error under {:?}", path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress;

    fn manifest_with_dirs(dirs: &[&str]) -> ModpackManifest {
        ModpackManifest {
            directories: Some(dirs.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn touch(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn allowed_set_defaults_without_manifest() {
        let allowed = allowed_top_level(None);
        assert_eq!(allowed.len(), DEFAULT_UPDATE_DIRS.len());
        assert!(allowed.contains("mods"));
        assert!(allowed.contains("kubejs"));
        assert!(allowed.contains("shaderpacks"));
    }

    #[test]
    fn allowed_set_normalizes_manifest_hints() {
        let manifest = manifest_with_dirs(&["Mods", "config/overrides", "\\scripts\\startup", "/kubejs/"]);
        let allowed = allowed_top_level(Some(&manifest));
        assert_eq!(allowed.len(), 4);
        assert!(allowed.contains("mods"));
        assert!(allowed.contains("config"));
        assert!(allowed.contains("scripts"));
        assert!(allowed.contains("kubejs"));
    }

    #[test]
    fn blank_hints_fall_back_to_defaults() {
        let manifest = manifest_with_dirs(&["", "   ", "/"]);
        let allowed = allowed_top_level(Some(&manifest));
        assert_eq!(allowed.len(), DEFAULT_UPDATE_DIRS.len());
        assert!(allowed.contains("mods"));
    }

    #[tokio::test]
    async fn install_copies_everything() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        touch(&source.join("mods/a.jar"), "jar");
        touch(&source.join("saves/world/level.dat"), "level");
        touch(&source.join("options.txt"), "pack options");

        synchronize(
            &source,
            &target,
            SyncMode::Install,
            None,
            &EventSender::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(read(&target.join("mods/a.jar")), "jar");
        assert_eq!(read(&target.join("saves/world/level.dat")), "level");
        assert_eq!(read(&target.join("options.txt")), "pack options");
    }

    #[tokio::test]
    async fn update_preserves_protected_entries() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        touch(&source.join("mods/new.jar"), "new");
        touch(&source.join("saves/world/level.dat"), "pack level");
        touch(&source.join("logs/latest.log"), "pack log");
        touch(&source.join("options.txt"), "pack options");
        touch(&source.join("OPTIONS.TXT"), "shouty options");
        touch(&target.join("saves/world/level.dat"), "user level");
        touch(&target.join("options.txt"), "user options");

        synchronize(
            &source,
            &target,
            SyncMode::Update,
            None,
            &EventSender::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(read(&target.join("mods/new.jar")), "new");
        assert_eq!(read(&target.join("saves/world/level.dat")), "user level");
        assert_eq!(read(&target.join("options.txt")), "user options");
        assert!(!target.join("logs/latest.log").exists());
    }

    #[tokio::test]
    async fn update_honors_manifest_directories() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        touch(&source.join("mods/a.jar"), "jar");
        touch(&source.join("custom/data.json"), "{}");

        let manifest = manifest_with_dirs(&["custom"]);
        synchronize(
            &source,
            &target,
            SyncMode::Update,
            Some(&manifest),
            &EventSender::disabled(),
        )
        .await
        .unwrap();

        // Only the declared directory is managed; mods stays untouched.
        assert!(!target.join("mods/a.jar").exists());
        assert_eq!(read(&target.join("custom/data.json")), "{}");
    }

    #[tokio::test]
    async fn update_never_writes_protected_even_if_requested() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        touch(&source.join("saves/world/level.dat"), "pack level");

        let manifest = manifest_with_dirs(&["saves"]);
        synchronize(
            &source,
            &target,
            SyncMode::Update,
            Some(&manifest),
            &EventSender::disabled(),
        )
        .await
        .unwrap();

        assert!(!target.join("saves/world/level.dat").exists());
    }

    #[tokio::test]
    async fn update_overwrites_managed_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        touch(&source.join("config/server.toml"), "new config");
        touch(&target.join("config/server.toml"), "old config");
        touch(&target.join("mods/old.jar"), "keep me");

        synchronize(
            &source,
            &target,
            SyncMode::Update,
            None,
            &EventSender::disabled(),
        )
        .await
        .unwrap();

        assert_eq!(read(&target.join("config/server.toml")), "new config");
        // Additive merge: nothing gets deleted.
        assert_eq!(read(&target.join("mods/old.jar")), "keep me");
    }

    #[tokio::test]
    async fn update_emits_progress_for_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        touch(&source.join("mods/a.jar"), "a");
        touch(&source.join("saves/world/level.dat"), "skipped");
        touch(&source.join("config/b.toml"), "b");

        let (sender, mut rx) = progress::channel();
        synchronize(&source, &target, SyncMode::Update, None, &sender)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let crate::core::progress::ModpackEvent::SyncProgress { processed, total } = event {
                seen.push((processed, total));
            }
        }
        // Skipped files still advance the bar.
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn empty_update_still_completes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("content");
        let target = dir.path().join("game");
        std::fs::create_dir_all(&source).unwrap();

        let (sender, mut rx) = progress::channel();
        synchronize(&source, &target, SyncMode::Update, None, &sender)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let crate::core::progress::ModpackEvent::SyncProgress { processed, total } = event {
                seen.push((processed, total));
            }
        }
        assert_eq!(seen, vec![(1, 1)]);
    }
}
