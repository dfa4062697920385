pub mod registry;
pub mod track;
pub mod traits;
pub mod ytdlp;

pub use registry::PlatformRegistry;
pub use track::Track;
pub use traits::{Platform, PlatformName};
pub use ytdlp::{YtDlpPlatform, PLATFORM_YOUTUBE, PLATFORM_YTDLP};
