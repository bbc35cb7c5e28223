//! Data models for Mural

mod collection;
mod entities;
mod period;
mod record;
mod shape;

pub use collection::{Collection, CollectionSpec, DateDimension, SortOrder};
pub use entities::{ContentItem, DirectoryEntry, Event, Member, Notice, Payload};
pub use period::{DateRange, Period};
pub use record::{Record, RecordId, CREATED_AT_FIELDS, LOCAL_CREATED_AT_FIELD};
pub use shape::PayloadShape;
