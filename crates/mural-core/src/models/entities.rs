//! Typed payloads for each collection
//!
//! The engine stores records as JSON objects; these builders validate user
//! input and render the payload an insert sends.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::{Map, Value};

use super::collection::Collection;
use super::period::Period;
use crate::error::{Error, Result};

/// A payload that can be inserted into its collection.
pub trait Payload: Serialize {
    const COLLECTION: Collection;

    /// Check mandatory fields.
    fn validate(&self) -> Result<()>;

    /// Validate and render as a JSON object.
    fn into_fields(self) -> Result<Map<String, Value>>
    where
        Self: Sized,
    {
        self.validate()?;
        match serde_json::to_value(&self)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(Error::InvalidInput(format!(
                "{} payload did not serialize to an object",
                Self::COLLECTION
            ))),
        }
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::InvalidInput(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Announcement valid over one or more periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub periods: Vec<Period>,
}

impl Notice {
    pub fn new(title: impl Into<String>, period: Period) -> Self {
        Self {
            title: title.into().trim().to_string(),
            periods: vec![period],
        }
    }
}

impl Payload for Notice {
    const COLLECTION: Collection = Collection::Notices;

    fn validate(&self) -> Result<()> {
        require(&self.title, "title")?;
        if self.periods.is_empty() {
            return Err(Error::InvalidInput(
                "a notice needs at least one period".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Payload for Member {
    const COLLECTION: Collection = Collection::Members;

    fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.address, "address")?;
        require(&self.phone, "phone")
    }
}

/// Board member listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Payload for DirectoryEntry {
    const COLLECTION: Collection = Collection::Directory;

    fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.role, "role")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub title: String,
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
    pub location: String,
}

impl Payload for Event {
    const COLLECTION: Collection = Collection::Events;

    fn validate(&self) -> Result<()> {
        require(&self.title, "title")?;
        require(&self.location, "location")?;
        let time = self.time.trim();
        if NaiveTime::parse_from_str(time, "%H:%M").is_err()
            && NaiveTime::parse_from_str(time, "%H:%M:%S").is_err()
        {
            return Err(Error::InvalidInput(format!(
                "time must be HH:MM, got '{time}'"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub date: NaiveDate,
}

impl Payload for ContentItem {
    const COLLECTION: Collection = Collection::Content;

    fn validate(&self) -> Result<()> {
        require(&self.kind, "type")?;
        require(&self.title, "title")
    }
}
