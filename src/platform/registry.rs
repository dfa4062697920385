use crate::platform::traits::{Platform, PlatformName};
use std::sync::Arc;
use tracing::debug;

/// The platform handler registry
///
/// Holds an explicit, priority-ordered list of handlers constructed by the
/// composition root and routes queries to the first handler whose validity
/// predicate accepts them. No global registration state.
pub struct PlatformRegistry {
    platforms: Vec<Arc<dyn Platform>>,
}

impl PlatformRegistry {
    /// Create a registry from handlers in descending priority order
    pub fn new(platforms: Vec<Arc<dyn Platform>>) -> Self {
        Self { platforms }
    }

    /// Find the highest-priority handler that accepts the query
    pub fn find(&self, query: &str) -> Option<Arc<dyn Platform>> {
        for platform in &self.platforms {
            if platform.is_valid(query) {
                debug!("Routing query to platform: {}", platform.name());
                return Some(Arc::clone(platform));
            }
        }
        None
    }

    /// Look up a handler by its name tag
    pub fn by_name(&self, name: PlatformName) -> Option<Arc<dyn Platform>> {
        self.platforms
            .iter()
            .find(|p| p.name() == name)
            .map(Arc::clone)
    }

    /// Find the highest-priority handler able to retrieve tracks produced
    /// by the handler named `source`
    pub fn download_capable(&self, source: PlatformName) -> Option<Arc<dyn Platform>> {
        self.platforms
            .iter()
            .find(|p| p.is_download_supported(source))
            .map(Arc::clone)
    }
}
