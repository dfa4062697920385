//! Cache artifact store
//!
//! Artifacts live flat in one downloads directory, named
//! `{cache key}.{ext}` where the key is `{track id}_{video|audio}`.

use crate::cache::probe;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the downloads directory on demand
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Resolver output template for a cache key; the resolver picks the
    /// extension.
    pub fn output_template(&self, key: &str) -> String {
        self.root
            .join(format!("{}.%(ext)s", key))
            .to_string_lossy()
            .into_owned()
    }

    /// First artifact whose file name starts with `{key}.`, if any
    pub async fn find(&self, key: &str) -> Option<PathBuf> {
        let prefix = format!("{}.", key);
        let mut dir = fs::read_dir(&self.root).await.ok()?;

        while let Ok(Some(entry)) = dir.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Some(entry.path());
            }
        }
        None
    }

    /// Cache lookup with validation.
    ///
    /// Video artifacts must pass the ffprobe check before reuse; audio
    /// artifacts are trusted once found. A failing artifact is evicted and
    /// the lookup reports a miss so the caller falls through to a fresh
    /// fetch.
    pub async fn lookup_valid(&self, key: &str, video: bool) -> Option<PathBuf> {
        let path = self.find(key).await?;

        if video && !probe::has_video_stream(&path).await {
            warn!(
                "Cached artifact failed validation, evicting: {}",
                path.display()
            );
            self.evict(&path).await;
            return None;
        }

        Some(path)
    }

    /// Best-effort delete; failure is logged, never propagated.
    pub async fn evict(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => info!("Evicted cache artifact: {}", path.display()),
            Err(e) => warn!("Failed to evict cache artifact {}: {}", path.display(), e),
        }
    }
}
