//! Identity keys used to match offline records against the remote store

use serde_json::Value;

use crate::models::{Collection, Record};
use crate::util::date_prefix;

/// Derives a record's logical identity from its payload.
///
/// Keys join the trimmed, case-preserved essential fields with `|`. Ids and
/// creation dates never participate, so an offline copy and its migrated
/// remote twin share a key. Distinct records with equal essentials collide
/// and are treated as one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupKeyResolver {
    collection: Collection,
}

impl DedupKeyResolver {
    pub const fn for_collection(collection: Collection) -> Self {
        Self { collection }
    }

    pub fn key(&self, record: &Record) -> String {
        let parts = match self.collection {
            Collection::Notices => vec![field(record, "title"), first_period_start(record)],
            Collection::Members => vec![
                field(record, "name"),
                field(record, "phone"),
                field(record, "birthdate"),
            ],
            Collection::Directory => vec![field(record, "name"), field(record, "role")],
            Collection::Events => vec![
                field(record, "title"),
                date_field(record, "date"),
                field(record, "time"),
            ],
            Collection::Content => vec![
                field(record, "type"),
                field(record, "title"),
                date_field(record, "date"),
            ],
        };
        parts.join("|")
    }
}

fn field(record: &Record, name: &str) -> String {
    record.text(name).map(|value| value.trim().to_string()).unwrap_or_default()
}

fn date_field(record: &Record, name: &str) -> String {
    record
        .text(name)
        .map(|value| date_prefix(&value).to_string())
        .unwrap_or_default()
}

fn first_period_start(record: &Record) -> String {
    let structured = record
        .get("periods")
        .and_then(Value::as_array)
        .and_then(|periods| periods.first())
        .and_then(|period| period.get("start"))
        .and_then(Value::as_str);
    let legacy = || {
        record
            .get("dates")
            .and_then(Value::as_array)
            .and_then(|dates| dates.first())
            .and_then(Value::as_str)
    };

    structured
        .or_else(legacy)
        .map(|value| date_prefix(value).to_string())
        .unwrap_or_default()
}
