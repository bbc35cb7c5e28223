//! Record model

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::period::{DateRange, Period};
use crate::util::parse_date;

/// Field names different remote schema versions use for the creation date,
/// in lookup order.
pub const CREATED_AT_FIELDS: [&str; 5] =
    ["criadoEm", "created_at", "createdAt", "created", "inserted_at"];

/// Field new local records are stamped with.
pub const LOCAL_CREATED_AT_FIELD: &str = "created_at";

/// Identifier of a record within its collection.
///
/// Remote stores hand out integers (bigserial) or opaque strings; offline
/// records use a local millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Text(s.to_string()), Self::Int))
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One entity of a collection: an id plus the collection-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Parse a JSON row, tolerating rows whose payload is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Raw field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field rendered as text. Numbers and booleans are stringified; `null`,
    /// arrays and objects yield `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Trimmed text, `None` when empty.
    pub fn trimmed(&self, name: &str) -> Option<String> {
        crate::util::normalize_text_option(self.text(name))
    }

    /// Creation date as stored, whatever the schema version called it.
    pub fn created_at(&self) -> Option<&str> {
        CREATED_AT_FIELDS.iter().find_map(|field| {
            self.fields
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
    }

    pub fn created_date(&self) -> Option<NaiveDate> {
        self.created_at().and_then(parse_date)
    }

    /// Whether any creation-date field is present.
    pub fn has_created_at(&self) -> bool {
        self.created_at().is_some()
    }

    /// Notice periods, reading the legacy `dates` list as single-day periods.
    ///
    /// Inverted or unparseable entries are skipped.
    pub fn periods(&self) -> Vec<Period> {
        if let Some(Value::Array(items)) = self.fields.get("periods") {
            let periods = items
                .iter()
                .filter_map(Period::from_value)
                .collect::<Vec<_>>();
            if !periods.is_empty() {
                return periods;
            }
        }

        if let Some(Value::Array(items)) = self.fields.get("dates") {
            return items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(parse_date)
                .map(Period::single)
                .collect();
        }

        Vec::new()
    }

    /// Whether any of the record's periods overlaps `range`.
    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.periods().iter().any(|period| period.overlaps(range))
    }

    /// Payload without creation-date fields, as sent on insert.
    pub fn insert_payload(&self) -> Map<String, Value> {
        let mut payload = self.fields.clone();
        for field in CREATED_AT_FIELDS {
            payload.remove(field);
        }
        payload
    }

    /// Copy payload fields the other record has and this one lacks.
    pub fn backfill_from(&mut self, other: &Self) {
        for (key, value) in &other.fields {
            if CREATED_AT_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let missing = self.fields.get(key).is_none_or(Value::is_null);
            if missing {
                self.fields.insert(key.clone(), value.clone());
            }
        }
        if !self.has_created_at() {
            if let Some(created_at) = other.created_at() {
                self.fields.insert(
                    LOCAL_CREATED_AT_FIELD.to_string(),
                    Value::String(created_at.to_string()),
                );
            }
        }
    }
}
