//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Directory holding cached media artifacts
    pub downloads_dir: PathBuf,

    /// Directory holding rotating cookie files for restricted sources
    pub cookies_dir: PathBuf,

    /// Resolution ceiling for video renditions (pixels of height)
    pub max_video_height: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            cookies_dir: PathBuf::from("cookies"),
            max_video_height: 720,
        }
    }
}
