//! Remote system of record
//!
//! [`RemoteStore`] is the only seam the engine talks to the network through.
//! Two implementations ship: [`SupabaseStore`] speaks `PostgREST`, and
//! [`MemoryStore`] keeps rows in process with fault injection for tests and
//! offline demos.

mod memory;
mod supabase;

use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Collection, Record, RecordId, SortOrder};

pub use memory::{FailOn, MemoryStore};
pub use supabase::{normalize_rest_url, SupabaseStore};

/// Failure of a single remote call. Never fatal: callers degrade that one
/// operation and carry on from the local cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store is not configured.")]
    NotConfigured,
    #[error("Remote request failed: {0}")]
    Transport(String),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Remote schema rejected the payload: {0}")]
    SchemaMismatch(String),
}

impl RemoteError {
    /// Whether the store understood the request and refused it. Only
    /// rejections justify retrying with a reduced payload shape.
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::SchemaMismatch(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Case-insensitive substring match on any of `columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub columns: Vec<&'static str>,
    pub needle: String,
}

impl TextFilter {
    pub fn new(columns: &[&'static str], needle: impl Into<String>) -> Self {
        Self {
            columns: columns.to_vec(),
            needle: needle.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let needle = self.needle.trim().to_lowercase();
        self.columns.iter().any(|column| {
            record
                .text(column)
                .is_some_and(|value| value.to_lowercase().contains(&needle))
        })
    }
}

/// One window of a collection listing. `range_from..=range_to` are row
/// offsets in `order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub order: SortOrder,
    pub range_from: usize,
    pub range_to: usize,
    pub text_filter: Option<TextFilter>,
}

impl ListQuery {
    /// Zero-based page `page` of `size` rows.
    pub const fn page(order: SortOrder, page: usize, size: usize) -> Self {
        let range_from = page * size;
        Self {
            order,
            range_from,
            range_to: range_from + size.saturating_sub(1),
            text_filter: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Option<TextFilter>) -> Self {
        self.text_filter = filter;
        self
    }

    pub const fn limit(&self) -> usize {
        self.range_to + 1 - self.range_from
    }
}

/// Contract of the remote system of record.
pub trait RemoteStore: Send + Sync + 'static {
    fn list(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send;

    /// Insert rows, returning the canonical stored rows in input order.
    fn insert(
        &self,
        collection: Collection,
        rows: Vec<Map<String, Value>>,
    ) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send;

    fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> impl Future<Output = RemoteResult<Vec<Record>>> + Send;

    fn delete(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}
