use std::sync::Arc;

use crate::cache::CacheManager;
use crate::sync::IncrementalUpdater;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub updater: Arc<IncrementalUpdater>,
}

impl AppState {
    pub fn new(updater: Arc<IncrementalUpdater>) -> Self {
        Self {
            cache: updater.cache().clone(),
            updater,
        }
    }
}
