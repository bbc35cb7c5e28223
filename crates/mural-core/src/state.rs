//! Per-collection state shared with consumers.

use serde::Serialize;

use crate::models::Record;

/// Where a collection is in its load / reconcile cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    /// Serving the remote store's view.
    Loaded,
    /// Serving the local cache because the remote store is absent or failed.
    Degraded,
    Migrating,
}

impl LoadPhase {
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Degraded)
    }
}

/// Where a view's rows came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Local,
}

/// What a list screen renders: the rows fetched so far plus paging state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageView {
    pub records: Vec<Record>,
    /// Pages consumed so far, starting at 1.
    pub page: usize,
    pub has_more: bool,
    pub source: Source,
}

impl PageView {
    pub const fn empty() -> Self {
        Self {
            records: Vec::new(),
            page: 0,
            has_more: false,
            source: Source::Local,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for PageView {
    fn default() -> Self {
        Self::empty()
    }
}
