//! Metadata extraction and the resolver's descriptor shape
//!
//! The resolver is invoked once per user query in JSON-metadata mode; the
//! parsed descriptor drives playlist expansion and live detection before any
//! retrieval work happens.

use crate::platform::track::Track;
use crate::platform::traits::PlatformName;
use crate::resolver::command::Resolver;
use crate::utils::TrackpipeError;
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Structured record the resolver emits for one media item or a container
/// of items. Ephemeral, never persisted.
///
/// Every field tolerates an explicit JSON `null`; the resolver emits nulls
/// freely depending on the upstream site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    /// Past live streams (VODs) are flagged separately and stay cacheable
    #[serde(default)]
    pub was_live: Option<bool>,
    #[serde(default)]
    pub entries: Option<Vec<MediaMetadata>>,
}

impl Resolver {
    /// Invoke the resolver in JSON-metadata mode and parse the descriptor.
    ///
    /// `-J` emits a single JSON document even for playlists, so a container
    /// arrives as one descriptor with `entries` populated.
    pub async fn extract_metadata(
        &self,
        reference: &str,
        cookie: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<MediaMetadata, TrackpipeError> {
        let args = metadata_args(reference, cookie);
        let output = self.run(&args, cancel).await?;

        if !output.success() {
            error!(
                "Metadata extraction failed:\nURL: {}\nStderr:\n{}",
                reference, output.stderr
            );
            return Err(TrackpipeError::ExtractionFailed(
                output.stderr.trim().to_string(),
            ));
        }

        let info: MediaMetadata = serde_json::from_str(&output.stdout).map_err(|e| {
            error!("Failed to parse yt-dlp JSON: {}", e);
            TrackpipeError::ExtractionFailed(format!("invalid JSON from yt-dlp: {}", e))
        })?;

        debug!(
            "Metadata extracted: ID={:?}, Title={:?}, IsLive={:?}, WasLive={:?}",
            info.id, info.title, info.is_live, info.was_live
        );

        Ok(info)
    }
}

fn metadata_args(reference: &str, cookie: Option<&Path>) -> Vec<String> {
    let mut args = vec!["-J".to_string(), "--no-warnings".to_string()];

    if let Some(cookie) = cookie {
        args.push("--cookies".to_string());
        args.push(cookie.to_string_lossy().into_owned());
    }

    args.push(reference.to_string());
    args
}

/// Map a descriptor to the tracks it represents.
///
/// A live descriptor becomes a single live-flagged track immediately; which
/// retrieval strategies a live track supports is decided at retrieval time,
/// not here. Containers are flattened recursively: every leaf becomes
/// exactly one track and a container itself never does.
pub fn tracks_from_metadata(
    info: &MediaMetadata,
    video: bool,
    source: PlatformName,
) -> Vec<Track> {
    if info.is_live.unwrap_or(false) {
        info!(
            "Detected live stream: {} (ID: {})",
            info.title.as_deref().unwrap_or(""),
            info.id.as_deref().unwrap_or("")
        );
        return vec![to_track(info, video, source)];
    }
    if info.was_live.unwrap_or(false) {
        info!(
            "Detected past live stream (VOD): {}",
            info.title.as_deref().unwrap_or("")
        );
    }

    let entries = info.entries.as_deref().unwrap_or(&[]);
    if !entries.is_empty() {
        info!("Playlist detected with {} entries", entries.len());
    }

    let mut tracks = Vec::new();
    collect_tracks(info, video, source, &mut tracks);
    tracks
}

fn collect_tracks(info: &MediaMetadata, video: bool, source: PlatformName, out: &mut Vec<Track>) {
    let entries = info.entries.as_deref().unwrap_or(&[]);
    if entries.is_empty() {
        if info.is_live.unwrap_or(false) {
            info!(
                "Including live entry in playlist: {}",
                info.title.as_deref().unwrap_or("")
            );
        }
        out.push(to_track(info, video, source));
        return;
    }

    for entry in entries {
        collect_tracks(entry, video, source, out);
    }
}

fn to_track(info: &MediaMetadata, video: bool, source: PlatformName) -> Track {
    // The original URL survives redirects and shorteners better than the
    // resolved page URL, so prefer it for re-resolution.
    let url = match info.original_url.as_deref() {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => info.webpage_url.clone().unwrap_or_default(),
    };

    Track {
        id: info.id.clone().unwrap_or_default(),
        title: info.title.clone().unwrap_or_default(),
        duration: info.duration.unwrap_or(0.0) as u64,
        artwork: info.thumbnail.clone().unwrap_or_default(),
        url,
        source,
        video,
        is_live: info.is_live.unwrap_or(false),
    }
}
