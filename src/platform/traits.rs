use crate::platform::track::Track;
use crate::utils::TrackpipeError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Tag identifying a platform handler, carried on every track it produces.
pub type PlatformName = &'static str;

/// Core trait for all platform handlers
///
/// A handler turns a query into tracks and turns a track into a consumable
/// location (a direct stream address or a local file path). The engine in
/// this crate, [`YtDlpPlatform`](crate::platform::YtDlpPlatform), is one
/// implementation; source-specific handlers in the enclosing bot are others.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Returns the handler's name tag (e.g. "YtDlp")
    fn name(&self) -> PlatformName;

    /// Checks whether this handler accepts the given query.
    ///
    /// Pure and total: no network access, never fails.
    fn is_valid(&self, query: &str) -> bool;

    /// Resolves a query into zero or more tracks, expanding playlists and
    /// flagging live content.
    ///
    /// Cancelling the token kills any in-flight resolver process.
    async fn get_tracks(
        &self,
        query: &str,
        video: bool,
        cancel: CancellationToken,
    ) -> Result<Vec<Track>, TrackpipeError>;

    /// Produces a consumable location for a track: a direct stream URL when
    /// one validates, otherwise a cached file path.
    async fn download(
        &self,
        track: &Track,
        cancel: CancellationToken,
    ) -> Result<String, TrackpipeError>;

    /// Whether this handler can retrieve tracks produced by the handler
    /// named `source` (capability check used by the registry).
    fn is_download_supported(&self, source: PlatformName) -> bool;
}
