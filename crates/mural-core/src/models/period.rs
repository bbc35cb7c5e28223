//! Date periods and search ranges

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::util::parse_date;

/// Inclusive span of days. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "period starts after it ends ({start} > {end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_date(start)
            .ok_or_else(|| Error::InvalidInput(format!("invalid start date: {start}")))?;
        let end = parse_date(end)
            .ok_or_else(|| Error::InvalidInput(format!("invalid end date: {end}")))?;
        Self::new(start, end)
    }

    /// The legacy single-date form.
    pub const fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Read a stored `{start, end}` object; inverted or malformed periods are
    /// `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let start = value.get("start")?.as_str()?;
        let end = value.get("end")?.as_str()?;
        Self::parse(start, end).ok()
    }

    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.start <= range.to && self.end >= range.from
    }
}

/// Date filter for searches. Only applied when both bounds are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub const fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// Build a range from optional bounds; a lone bound is no range at all.
    pub fn from_bounds(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<Self> {
        match (from, to) {
            (Some(from), Some(to)) => Some(Self::new(from, to)),
            _ => None,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.to
    }
}
