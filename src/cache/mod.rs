pub mod inflight;
pub mod probe;
pub mod store;

pub use inflight::InflightGuard;
pub use store::CacheStore;
