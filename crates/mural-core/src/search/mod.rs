//! Text and date-range search over collections
//!
//! The same filter pipeline runs client-side over remote pages and over the
//! local cache, so degraded searches return what a remote search would.

mod debounce;

use chrono::NaiveDate;

use crate::models::{CollectionSpec, DateRange, Record};
use crate::remote::TextFilter;
use crate::util::normalize_text_option;

pub use debounce::{SearchDebouncer, SearchInput};

/// A search request. Empty text and no range means "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub range: Option<DateRange>,
}

impl SearchQuery {
    /// Build from raw input; blank text is no text, a lone bound is no range.
    pub fn new(text: Option<String>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            text: normalize_text_option(text),
            range: DateRange::from_bounds(from, to),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Some(text.into()), None, None)
    }

    pub const fn is_empty(&self) -> bool {
        self.text.is_none() && self.range.is_none()
    }

    /// Remote text filter over `columns`, if the query has text.
    pub fn text_filter(&self, columns: &[&'static str]) -> Option<TextFilter> {
        self.text
            .as_ref()
            .map(|needle| TextFilter::new(columns, needle.clone()))
    }

    pub fn matches(&self, spec: &CollectionSpec, record: &Record) -> bool {
        let text_ok = self
            .text
            .as_deref()
            .is_none_or(|needle| spec.matches_text(record, needle));
        let range_ok = self
            .range
            .as_ref()
            .is_none_or(|range| spec.matches_range(record, range));
        text_ok && range_ok
    }

    /// Records matching the query, order preserved.
    pub fn filter(&self, spec: &CollectionSpec, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|record| self.matches(spec, record))
            .cloned()
            .collect()
    }
}
