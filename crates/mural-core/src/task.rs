//! Cancellable background tasks.

use tokio::task::JoinHandle;

/// A spawned loop or timer. Dropping the handle cancels the task.
#[derive(Debug)]
#[must_use = "dropping a BackgroundTask cancels it"]
pub struct BackgroundTask {
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
