pub mod command;
pub mod fetch;
pub mod metadata;
pub mod stream;

pub use command::{find_resolver, Resolver, ResolverOutput};
pub use fetch::FetchOptions;
pub use metadata::{tracks_from_metadata, MediaMetadata};
pub use stream::{probe_client, DirectStreamOptions, PROBE_USER_AGENT, STREAM_PROBE_TIMEOUT};
