//! In-process change notifications keyed by collection topic.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::models::Collection;

/// Name of a notification channel, `<collection>:updated` for collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn updated(collection: Collection) -> Self {
        Self(format!("{}:updated", collection.name()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Handler = Arc<dyn Fn(&Topic) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<u64, (Topic, Handler)>,
}

/// Process-wide pub/sub. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &lock(&self.registry).handlers.len())
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call every current subscriber of `topic` before returning.
    ///
    /// Handlers run outside the registry lock and may subscribe or
    /// unsubscribe themselves.
    pub fn publish(&self, topic: &Topic) {
        let handlers = lock(&self.registry)
            .handlers
            .values()
            .filter(|(subscribed, _)| subscribed == topic)
            .map(|(_, handler)| Arc::clone(handler))
            .collect::<Vec<_>>();

        tracing::debug!("Publishing {} to {} subscribers", topic, handlers.len());
        for handler in handlers {
            handler(topic);
        }
    }

    pub fn subscribe(
        &self,
        topic: Topic,
        handler: impl Fn(&Topic) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.insert(id, (topic, Arc::new(handler)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        lock(&self.registry)
            .handlers
            .values()
            .filter(|(subscribed, _)| subscribed == topic)
            .count()
    }
}

/// Handle keeping a handler registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).handlers.remove(&self.id);
        }
    }
}
