//! trackpipe library
//!
//! Resolves a user-supplied URL into playable tracks and produces a
//! consumable location for each one: a validated direct stream address when
//! the upstream allows it, otherwise a locally cached file fetched through
//! the external resolver.

pub mod cache;
pub mod cookies;
pub mod platform;
pub mod resolver;
pub mod utils;

// Re-export main types for easier use
pub use cache::{CacheStore, InflightGuard};
pub use cookies::CookieJarPool;
pub use platform::{Platform, PlatformName, PlatformRegistry, Track, YtDlpPlatform};
pub use resolver::{MediaMetadata, Resolver};
pub use utils::{AppSettings, TrackpipeError};
