//! Collections and their per-collection conventions

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::period::{DateRange, Period};
use super::record::Record;
use super::shape::PayloadShape;
use crate::error::Error;
use crate::util::parse_date;

/// A named set of records of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notices,
    Members,
    Directory,
    Events,
    Content,
}

impl Collection {
    pub const ALL: [Self; 5] = [
        Self::Notices,
        Self::Members,
        Self::Directory,
        Self::Events,
        Self::Content,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Notices => "notices",
            Self::Members => "members",
            Self::Directory => "directory",
            Self::Events => "events",
            Self::Content => "content",
        }
    }

    /// Local cache slot holding this collection's mirror.
    pub const fn slot(self) -> &'static str {
        match self {
            Self::Notices => "notices-list",
            Self::Members => "members-list",
            Self::Directory => "directory-list",
            Self::Events => "events-list",
            Self::Content => "content-list",
        }
    }

    /// Remote table name.
    pub const fn table(self) -> &'static str {
        self.name()
    }

    pub fn spec(self) -> &'static CollectionSpec {
        match self {
            Self::Notices => &NOTICES,
            Self::Members => &MEMBERS,
            Self::Directory => &DIRECTORY,
            Self::Events => &EVENTS,
            Self::Content => &CONTENT,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notices" | "notice" => Ok(Self::Notices),
            "members" | "member" => Ok(Self::Members),
            "directory" | "directory-entries" => Ok(Self::Directory),
            "events" | "event" => Ok(Self::Events),
            "content" | "contents" | "content-items" => Ok(Self::Content),
            other => Err(Error::InvalidInput(format!("unknown collection: {other}"))),
        }
    }
}

/// Ordering convention of a collection's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: &'static str,
    pub ascending: bool,
    /// Secondary column compared when `column` ties.
    pub tiebreak: Option<&'static str>,
}

impl SortOrder {
    const fn id_desc() -> Self {
        Self {
            column: "id",
            ascending: false,
            tiebreak: None,
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = if self.column == "id" {
            a.id.cmp(&b.id)
        } else {
            compare_optional(a.text(self.column), b.text(self.column)).then_with(|| {
                self.tiebreak.map_or(Ordering::Equal, |column| {
                    compare_optional(a.text(column), b.text(column))
                })
            })
        };

        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }

    /// Stable sort by this ordering. Id-ordered sequences keep their
    /// placement order: optimistic local ids and remote ids do not share a
    /// numbering scheme.
    pub fn sort(&self, records: &mut [Record]) {
        if self.column != "id" {
            records.sort_by(|a, b| self.compare(a, b));
        }
    }

    /// Insert a new record where this ordering wants it. Newest-first
    /// collections put it on top.
    pub fn place(&self, records: &mut Vec<Record>, record: Record) {
        if self.column == "id" {
            if self.ascending {
                records.push(record);
            } else {
                records.insert(0, record);
            }
            return;
        }

        self.insert_sorted(records, record);
    }

    /// Insert `record` before the first row that sorts after it, whatever
    /// the column.
    pub fn insert_sorted(&self, records: &mut Vec<Record>, record: Record) {
        let position =
            records.partition_point(|existing| self.compare(existing, &record) != Ordering::Greater);
        records.insert(position, record);
    }
}

/// Missing values sort after present ones.
fn compare_optional(a: Option<String>, b: Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Which part of a record a date-range search filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDimension {
    /// The collection has no date to filter by; ranges are ignored.
    None,
    /// Notice periods (legacy `dates` included).
    Periods,
    /// A single date column.
    Field(&'static str),
}

/// Everything the engine needs to know about a collection.
#[derive(Debug)]
pub struct CollectionSpec {
    pub order: SortOrder,
    /// Columns matched by text search; the first one is the single-column fallback.
    pub search_columns: &'static [&'static str],
    pub date_dimension: DateDimension,
    /// Fields that must be present for a payload to be accepted.
    pub mandatory: &'static [&'static str],
    /// Insert shapes, richest first.
    pub shapes: &'static [PayloadShape],
}

impl CollectionSpec {
    /// Whether a record falls in `range` along this collection's date dimension.
    pub fn matches_range(&self, record: &Record, range: &DateRange) -> bool {
        match self.date_dimension {
            DateDimension::None => true,
            DateDimension::Periods => record.overlaps(range),
            DateDimension::Field(column) => record
                .text(column)
                .as_deref()
                .and_then(parse_date)
                .is_some_and(|day| Period::single(day).overlaps(range)),
        }
    }

    /// Case-insensitive substring match over the searchable columns.
    pub fn matches_text(&self, record: &Record, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.search_columns.iter().any(|column| {
            record
                .text(column)
                .is_some_and(|value| value.to_lowercase().contains(&needle))
        })
    }
}

static NOTICES: CollectionSpec = CollectionSpec {
    order: SortOrder::id_desc(),
    search_columns: &["title", "content", "description"],
    date_dimension: DateDimension::Periods,
    mandatory: &["title"],
    shapes: &[
        PayloadShape::Full,
        PayloadShape::LegacyDates,
        PayloadShape::Only(&["title"]),
    ],
};

static MEMBERS: CollectionSpec = CollectionSpec {
    order: SortOrder::id_desc(),
    search_columns: &["name", "address", "phone"],
    date_dimension: DateDimension::None,
    mandatory: &["name", "address", "phone"],
    shapes: &[
        PayloadShape::Full,
        PayloadShape::Only(&["name", "address", "phone"]),
    ],
};

static DIRECTORY: CollectionSpec = CollectionSpec {
    order: SortOrder::id_desc(),
    search_columns: &["name", "role"],
    date_dimension: DateDimension::None,
    mandatory: &["name", "role"],
    shapes: &[PayloadShape::Full, PayloadShape::Only(&["name", "role"])],
};

static EVENTS: CollectionSpec = CollectionSpec {
    order: SortOrder {
        column: "date",
        ascending: true,
        tiebreak: Some("time"),
    },
    search_columns: &["title", "location"],
    date_dimension: DateDimension::Field("date"),
    mandatory: &["title", "date", "time", "location"],
    shapes: &[
        PayloadShape::Full,
        PayloadShape::Only(&["title", "date", "time", "location"]),
    ],
};

static CONTENT: CollectionSpec = CollectionSpec {
    order: SortOrder::id_desc(),
    search_columns: &["title", "type"],
    date_dimension: DateDimension::Field("date"),
    mandatory: &["type", "title", "date"],
    shapes: &[
        PayloadShape::Full,
        PayloadShape::Only(&["type", "title", "date"]),
    ],
};
