// src/blob/mod.rs
// Filesystem-backed store for immutable binary artifacts (screenshots).
// Every path component is sanitized before it touches disk so no caller can
// escape the store's root.

use crate::error::{Result, WaddleError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

/// Replace characters illegal in a path component with `_` and trim outer
/// whitespace. Also collapses `..` so callers cannot escape the blob root.
pub fn sanitize_component(raw: &str) -> String {
    let trimmed = raw.trim();
    let replaced: String = trimmed
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect();
    replaced.replace("..", "_")
}

#[derive(Debug, Clone, Default)]
pub struct BlobStats {
    pub file_count: u64,
    pub total_bytes: u64,
    pub screenshot_count: u64,
    pub oldest_mtime: Option<SystemTime>,
}

pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_app_dir(&self, date: &str, app: &str) -> Result<PathBuf> {
        let date = sanitize_component(date);
        let app = sanitize_component(app);
        if date.is_empty() || app.is_empty() {
            return Err(WaddleError::validation("date and app must not be empty"));
        }
        Ok(self.root.join(date).join(app))
    }

    /// Save a screenshot under `{root}/{date}/{app}/screenshots/{filename}`.
    /// Returns the path relative to the blob root.
    pub async fn save(
        &self,
        date: &str,
        app: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let filename = sanitize_component(filename);
        if filename.is_empty() {
            return Err(WaddleError::validation("filename must not be empty"));
        }
        let dir = self.session_app_dir(date, app)?.join("screenshots");
        fs::create_dir_all(&dir).await?;
        let path = dir.join(&filename);
        fs::write(&path, bytes).await?;
        debug!(%filename, bytes = bytes.len(), "saved screenshot");

        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        Ok(relative)
    }

    /// Overwrite `{root}/{date}/{app}/latest.png`.
    pub async fn save_latest(&self, date: &str, app: &str, bytes: &[u8]) -> Result<String> {
        let dir = self.session_app_dir(date, app)?;
        fs::create_dir_all(&dir).await?;
        let path = dir.join("latest.png");
        fs::write(&path, bytes).await?;

        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        Ok(relative)
    }

    pub async fn read(&self, relative_path: &str) -> Result<Vec<u8>> {
        let path = self.root.join(relative_path);
        Ok(fs::read(&path).await?)
    }

    pub async fn exists(&self, relative_path: &str) -> bool {
        fs::metadata(self.root.join(relative_path)).await.is_ok()
    }

    /// Delete the entire `{root}/{date}` subtree for a session.
    pub async fn delete_session_subtree(&self, date: &str) -> Result<()> {
        let date = sanitize_component(date);
        let dir = self.root.join(&date);
        if fs::metadata(&dir).await.is_ok() {
            fs::remove_dir_all(&dir).await?;
            info!(%date, "deleted blob subtree");
        }
        Ok(())
    }

    pub async fn list_session_files(&self, date: &str) -> Result<Vec<String>> {
        let date = sanitize_component(date);
        let dir = self.root.join(&date);
        let mut out = Vec::new();
        if fs::metadata(&dir).await.is_err() {
            return Ok(out);
        }
        for entry in walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                out.push(relative);
            }
        }
        Ok(out)
    }

    pub async fn stats(&self) -> Result<BlobStats> {
        let mut stats = BlobStats::default();
        if fs::metadata(&self.root).await.is_err() {
            return Ok(stats);
        }
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            stats.file_count += 1;
            stats.total_bytes += meta.len();
            if entry.path().extension().and_then(|e| e.to_str()) == Some("png") {
                stats.screenshot_count += 1;
            }
            if let Ok(mtime) = meta.modified() {
                stats.oldest_mtime = Some(match stats.oldest_mtime {
                    Some(existing) if existing < mtime => existing,
                    _ => mtime,
                });
            }
        }
        Ok(stats)
    }

    /// Delete any top-level subdirectory whose sanitized name is not in
    /// `valid_session_dates`.
    pub async fn clean_orphans(&self, valid_session_dates: &[String]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        if fs::metadata(&self.root).await.is_err() {
            return Ok(removed);
        }
        let valid: std::collections::HashSet<String> = valid_session_dates
            .iter()
            .map(|d| sanitize_component(d))
            .collect();

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !valid.contains(&name) {
                if let Err(e) = fs::remove_dir_all(entry.path()).await {
                    warn!(%name, error = %e, "failed to remove orphan blob subtree");
                    continue;
                }
                removed.push(name);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_read_roundtrips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let bytes = vec![7u8; 1024];
        let rel = store
            .save("2025-01-16", "Chrome", "15-30-00.png", &bytes)
            .await
            .unwrap();
        assert!(store.exists(&rel).await);
        assert_eq!(store.read(&rel).await.unwrap(), bytes);
        assert!(!rel.contains(['<', '>', ':', '"', '|', '?', '*']));
    }

    #[tokio::test]
    async fn delete_session_subtree_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store
            .save("2025-01-16", "Chrome", "a.png", b"x")
            .await
            .unwrap();
        store.delete_session_subtree("2025-01-16").await.unwrap();
        assert!(store.list_session_files("2025-01-16").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sanitizes_traversal_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let rel = store
            .save("../../etc", "..", "../passwd", b"x")
            .await
            .unwrap();
        assert!(rel.starts_with("_"));
        assert!(store.root().join(&rel).starts_with(store.root()));
    }

    #[tokio::test]
    async fn clean_orphans_keeps_only_valid_dates() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save("2025-01-01", "App", "a.png", b"x").await.unwrap();
        store.save("2025-01-02", "App", "a.png", b"x").await.unwrap();
        let removed = store
            .clean_orphans(&["2025-01-01".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, vec!["2025-01-02".to_string()]);
    }
}
