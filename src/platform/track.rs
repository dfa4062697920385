//! The track entity consumed by the rest of the bot

use crate::platform::traits::PlatformName;

/// A single unit of playable media produced by a platform handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Resolver-assigned identifier, stable within a source
    pub id: String,
    pub title: String,
    /// Duration in whole seconds, truncated from the resolver's float
    pub duration: u64,
    /// Thumbnail address, may be empty
    pub artwork: String,
    /// Canonical page address used for re-resolution
    pub url: String,
    /// Which handler produced this track
    pub source: PlatformName,
    /// Whether the video rendition was requested (vs. audio-only)
    pub video: bool,
    /// Whether the underlying source is an open-ended live stream
    pub is_live: bool,
}

impl Track {
    /// Cache artifact name stem. Audio and video renditions of the same
    /// media item are wholly different artifacts and must never share a key.
    pub fn cache_key(&self) -> String {
        if self.video {
            format!("{}_video", self.id)
        } else {
            format!("{}_audio", self.id)
        }
    }
}
