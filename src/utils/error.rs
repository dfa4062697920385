//! Error handling for trackpipe

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for trackpipe
#[derive(Debug, Error)]
pub enum TrackpipeError {
    #[error("yt-dlp not found. Please install yt-dlp")]
    ResolverNotFound,

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Failed to extract metadata: {0}")]
    ExtractionFailed(String),

    #[error("no valid stream URLs returned by yt-dlp")]
    NoValidStream,

    #[error("live stream cannot be downloaded as file; only direct streaming supported")]
    LiveUnsupportedForFile,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("downloaded file missing at {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("download cancelled by user")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
