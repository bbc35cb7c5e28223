//! Cross-context change detection through the persisted cache.
//!
//! Another process (or another cache handle) writing a slot bumps its
//! revision. Polling revisions is how a context learns about changes it did
//! not publish itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::db::LocalCache;
use crate::models::Collection;
use crate::task::BackgroundTask;

pub struct CacheWatcher {
    cache: Arc<LocalCache>,
    seen: HashMap<Collection, u64>,
}

impl CacheWatcher {
    /// Watch `collections`, starting from their current revisions.
    pub fn new(cache: Arc<LocalCache>, collections: &[Collection]) -> Self {
        let seen = collections
            .iter()
            .map(|collection| (*collection, cache.revision(*collection)))
            .collect();
        Self { cache, seen }
    }

    /// Collections whose slot changed since the previous poll.
    pub fn poll(&mut self) -> Vec<Collection> {
        let mut changed = Vec::new();
        for (collection, seen) in &mut self.seen {
            let revision = self.cache.revision(*collection);
            if revision != *seen {
                *seen = revision;
                changed.push(*collection);
            }
        }
        changed.sort();
        changed
    }

    /// Poll every `interval` on a background task, calling `handler` for each
    /// changed collection.
    pub fn spawn(
        mut self,
        interval: Duration,
        handler: impl Fn(Collection) + Send + Sync + 'static,
    ) -> BackgroundTask {
        BackgroundTask::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                for collection in self.poll() {
                    tracing::debug!("Cache slot {} changed elsewhere", collection.slot());
                    handler(collection);
                }
            }
        })
    }
}
