//! Insert payload shapes

use serde_json::{Map, Value};

/// One projection of an insert payload. A collection lists its shapes from
/// richest to most reduced; inserts try them in that order until the remote
/// schema accepts one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Every payload field as given.
    Full,
    /// Structured `periods` flattened into the legacy `dates` list of start days.
    LegacyDates,
    /// Only the listed mandatory columns.
    Only(&'static [&'static str]),
}

impl PayloadShape {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::LegacyDates => "legacy-dates",
            Self::Only(_) => "minimal",
        }
    }

    pub fn project(&self, payload: &Map<String, Value>) -> Map<String, Value> {
        match self {
            Self::Full => payload.clone(),
            Self::LegacyDates => {
                let mut projected = payload.clone();
                if let Some(Value::Array(periods)) = projected.remove("periods") {
                    let dates = periods
                        .iter()
                        .filter_map(|period| period.get("start").cloned())
                        .collect::<Vec<_>>();
                    projected.insert("dates".to_string(), Value::Array(dates));
                }
                projected
            }
            Self::Only(columns) => columns
                .iter()
                .filter_map(|column| {
                    payload
                        .get(*column)
                        .map(|value| ((*column).to_string(), value.clone()))
                })
                .collect(),
        }
    }
}
