use std::sync::Arc;

use super::store::SearchCache;

/// The two cache tiers consulted by the search path and flushed by the
/// index synchronizer.
#[derive(Clone)]
pub struct CacheTiers {
    pub local: Arc<dyn SearchCache>,
    pub shared: Arc<dyn SearchCache>,
}

impl CacheTiers {
    pub fn new(local: Arc<dyn SearchCache>, shared: Arc<dyn SearchCache>) -> Self {
        Self { local, shared }
    }

    /// Flush both tiers, local first.
    pub async fn clear_all(&self) {
        self.local.clear().await;
        self.shared.clear().await;
    }
}
