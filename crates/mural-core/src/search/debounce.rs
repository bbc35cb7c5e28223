//! Debounced search input.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;

use super::SearchQuery;
use crate::task::BackgroundTask;

/// Raw search controls as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchInput {
    pub text: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SearchInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Worth a search: non-blank text, or both range bounds.
    pub fn is_dispatchable(&self) -> bool {
        !self.text.trim().is_empty() || (self.from.is_some() && self.to.is_some())
    }

    pub fn to_query(&self) -> SearchQuery {
        SearchQuery::new(Some(self.text.clone()), self.from, self.to)
    }
}

type Dispatch = Arc<dyn Fn(SearchInput) + Send + Sync>;

/// Collapses bursts of input changes into one search.
///
/// Each `push` replaces the pending timer; only the input still current when
/// the delay elapses is dispatched.
pub struct SearchDebouncer {
    delay: Duration,
    version: Arc<AtomicU64>,
    pending: Mutex<Option<BackgroundTask>>,
    dispatch: Dispatch,
}

impl SearchDebouncer {
    pub fn new(delay: Duration, dispatch: impl Fn(SearchInput) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            version: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            dispatch: Arc::new(dispatch),
        }
    }

    /// Must be called within a tokio runtime.
    pub fn push(&self, input: SearchInput) {
        let current = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let version = Arc::clone(&self.version);
        let dispatch = Arc::clone(&self.dispatch);
        let delay = self.delay;

        let task = BackgroundTask::spawn(async move {
            tokio::time::sleep(delay).await;

            // Superseded while sleeping
            if version.load(Ordering::SeqCst) != current {
                return;
            }
            if input.is_dispatchable() {
                dispatch(input);
            } else {
                tracing::debug!("Debounced search input is blank, not dispatching");
            }
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        drop(previous);
    }

    /// Drop any pending dispatch.
    pub fn cancel(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
