//! Handle on a mutation whose remote half is still running.

use tokio::task::JoinHandle;

/// A write already committed locally.
///
/// `local()` is what the cache and live view hold right now. `settle()`
/// waits for the remote attempt and yields the final value: the canonical
/// remote row when the remote store accepted the write, the local value
/// otherwise. Dropping the handle does not cancel the remote attempt.
#[derive(Debug)]
pub struct PendingWrite<T> {
    local: T,
    task: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> PendingWrite<T> {
    pub(crate) const fn settled(local: T) -> Self {
        Self { local, task: None }
    }

    pub(crate) const fn new(local: T, task: JoinHandle<T>) -> Self {
        Self {
            local,
            task: Some(task),
        }
    }

    pub const fn local(&self) -> &T {
        &self.local
    }

    /// Whether a remote attempt is still running.
    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn settle(self) -> T {
        let Self { local, task } = self;
        let Some(task) = task else {
            return local;
        };
        match task.await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("Remote write task ended abnormally: {}", error);
                local
            }
        }
    }
}
