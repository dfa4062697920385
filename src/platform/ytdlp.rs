//! The yt-dlp platform handler
//!
//! The generalist of the handler set: accepts any reference with a scheme
//! and a host and delegates extraction and retrieval to the external
//! resolver. Retrieval always tries a direct stream address first (the only
//! viable path for live content and the cheapest for everything else), then
//! falls back to the cache and a full fetch for non-live tracks.

use crate::cache::{CacheStore, InflightGuard};
use crate::cookies::CookieJarPool;
use crate::platform::track::Track;
use crate::platform::traits::{Platform, PlatformName};
use crate::resolver::fetch::FetchOptions;
use crate::resolver::metadata::tracks_from_metadata;
use crate::resolver::stream::DirectStreamOptions;
use crate::resolver::{self, Resolver};
use crate::utils::{AppSettings, TrackpipeError};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

pub const PLATFORM_YTDLP: PlatformName = "YtDlp";

/// Name tag of the dedicated restricted-platform handler in the enclosing
/// bot. Tracks it produces can also be retrieved by this handler.
pub const PLATFORM_YOUTUBE: PlatformName = "YouTube";

static RESTRICTED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)(youtube\.com|youtu\.be|music\.youtube\.com)")
        .expect("valid restricted-source pattern")]
});

/// A reference is usable only if it parses as a URL carrying both a scheme
/// and a host. Pure and total; no network access.
pub fn is_valid_reference(query: &str) -> bool {
    // Url::parse never succeeds without a scheme, so host presence is the
    // remaining requirement.
    match Url::parse(query.trim()) {
        Ok(url) => url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Whether the URL belongs to the restricted platform family that needs
/// session cookies for reliable extraction.
pub fn is_restricted_url(url: &str) -> bool {
    RESTRICTED_PATTERNS.iter().any(|p| p.is_match(url))
}

pub struct YtDlpPlatform {
    name: PlatformName,
    resolver: Resolver,
    settings: AppSettings,
    cache: CacheStore,
    cookies: CookieJarPool,
    inflight: InflightGuard,
    probe_client: reqwest::Client,
}

impl YtDlpPlatform {
    /// Locate the resolver binary and wire up the engine
    pub fn new(settings: AppSettings) -> Result<Self, TrackpipeError> {
        let resolver = Resolver::locate()?;
        Self::with_resolver(resolver, settings)
    }

    /// Build the engine around an already-located resolver (tests inject
    /// stub scripts through this)
    pub fn with_resolver(
        resolver: Resolver,
        settings: AppSettings,
    ) -> Result<Self, TrackpipeError> {
        let cache = CacheStore::new(settings.downloads_dir.clone());
        let cookies = CookieJarPool::new(settings.cookies_dir.clone());
        let probe_client = resolver::probe_client()?;

        Ok(Self {
            name: PLATFORM_YTDLP,
            resolver,
            settings,
            cache,
            cookies,
            inflight: InflightGuard::new(),
            probe_client,
        })
    }

    /// Cookie to attach for this URL, restricted sources only
    async fn cookie_for(&self, url: &str) -> Option<PathBuf> {
        if is_restricted_url(url) {
            self.cookies.random_cookie_file().await
        } else {
            None
        }
    }

    async fn resolve_direct(
        &self,
        track: &Track,
        cancel: &CancellationToken,
    ) -> Result<String, TrackpipeError> {
        let cookie = self.cookie_for(&track.url).await;
        let opts = DirectStreamOptions {
            video: track.video,
            restricted: is_restricted_url(&track.url),
            max_height: self.settings.max_video_height,
            cookie: cookie.as_deref(),
        };

        self.resolver
            .resolve_direct_stream(&self.probe_client, &track.url, opts, cancel)
            .await
    }

    /// Durable retrieval: a cache hit or a fresh fetch, at most one fetch
    /// in flight per cache key.
    pub async fn fetch_and_cache(
        &self,
        track: &Track,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TrackpipeError> {
        if track.is_live {
            // Live content has no finite file to cache.
            return Err(TrackpipeError::LiveUnsupportedForFile);
        }

        let key = track.cache_key();
        let _inflight = self.inflight.acquire(&key).await;

        // Re-check under the lock: a concurrent request for the same key may
        // have finished this fetch while we waited.
        if let Some(path) = self.cache.lookup_valid(&key, track.video).await {
            info!("Using cached file: {}", path.display());
            return Ok(path);
        }

        self.cache.ensure_dir().await?;

        let cookie = self.cookie_for(&track.url).await;
        let opts = FetchOptions {
            video: track.video,
            max_height: self.settings.max_video_height,
            cookie: cookie.as_deref(),
            output_template: self.cache.output_template(&key),
        };

        self.resolver.fetch_media(&track.url, opts, cancel).await
    }
}

#[async_trait]
impl Platform for YtDlpPlatform {
    fn name(&self) -> PlatformName {
        self.name
    }

    fn is_valid(&self, query: &str) -> bool {
        is_valid_reference(query)
    }

    async fn get_tracks(
        &self,
        query: &str,
        video: bool,
        cancel: CancellationToken,
    ) -> Result<Vec<Track>, TrackpipeError> {
        if !is_valid_reference(query) {
            return Err(TrackpipeError::InvalidReference(query.to_string()));
        }

        let cookie = self.cookie_for(query).await;
        let info = self
            .resolver
            .extract_metadata(query, cookie.as_deref(), &cancel)
            .await?;

        Ok(tracks_from_metadata(&info, video, self.name))
    }

    async fn download(
        &self,
        track: &Track,
        cancel: CancellationToken,
    ) -> Result<String, TrackpipeError> {
        info!(
            "Attempting direct stream for track: {} (Video={}, IsLive={})",
            track.id, track.video, track.is_live
        );

        match self.resolve_direct(track, &cancel).await {
            Ok(stream_url) => {
                info!("Direct stream succeeded for {}", track.id);
                return Ok(stream_url);
            }
            // A cancelled request must not fall through to a fresh fetch.
            Err(TrackpipeError::Cancelled) => return Err(TrackpipeError::Cancelled),
            Err(e) => warn!("Direct stream failed for {}: {}", track.id, e),
        }

        if track.is_live {
            return Err(TrackpipeError::LiveUnsupportedForFile);
        }

        let path = self.fetch_and_cache(track, &cancel).await?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn is_download_supported(&self, source: PlatformName) -> bool {
        source == self.name || source == PLATFORM_YOUTUBE
    }
}
