//! Rotating cookie pool for restricted sources
//!
//! Restricted platforms throttle or block anonymous extraction; the resolver
//! accepts a Netscape cookie file to present a session. The pool is a flat
//! directory of `.txt` cookie files, one picked at random per invocation so
//! no single session carries all the traffic.

use rand::seq::SliceRandom;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

pub struct CookieJarPool {
    dir: PathBuf,
}

impl CookieJarPool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// One usable cookie-file path chosen pseudo-randomly from the pool, or
    /// `None` when the pool directory is missing or holds no cookie files.
    pub async fn random_cookie_file(&self) -> Option<PathBuf> {
        let mut entries = fs::read_dir(&self.dir).await.ok()?;

        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }

        let chosen = files.choose(&mut rand::thread_rng()).cloned();
        if let Some(cookie) = &chosen {
            debug!("Using cookie file: {}", cookie.display());
        }
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_pool_directory_yields_none() {
        let pool = CookieJarPool::new("/nonexistent/cookie-pool");
        assert!(pool.random_cookie_file().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_pool_yields_none() {
        let temp = TempDir::new().unwrap();
        let pool = CookieJarPool::new(temp.path());
        assert!(pool.random_cookie_file().await.is_none());
    }

    #[tokio::test]
    async fn test_only_txt_files_are_considered() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("session.txt"), "# Netscape HTTP Cookie File").unwrap();
        std::fs::write(temp.path().join("notes.md"), "ignore me").unwrap();
        std::fs::write(temp.path().join("data.json"), "{}").unwrap();

        let pool = CookieJarPool::new(temp.path());
        for _ in 0..10 {
            let chosen = pool.random_cookie_file().await.unwrap();
            assert!(chosen.ends_with("session.txt"));
        }
    }

    #[tokio::test]
    async fn test_choice_comes_from_the_pool() {
        let temp = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(temp.path().join(name), "#").unwrap();
        }

        let pool = CookieJarPool::new(temp.path());
        let chosen = pool.random_cookie_file().await.unwrap();
        let name = chosen.file_name().unwrap().to_string_lossy().into_owned();
        assert!(["a.txt", "b.txt", "c.txt"].contains(&name.as_str()));
    }
}
