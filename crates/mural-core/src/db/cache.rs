//! Local offline mirror, one slot per collection
//!
//! The cache never fails observably: storage or decoding errors are logged
//! and read as an empty slot, failed writes are logged and dropped. Callers
//! always get *something* to render.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::Database;
use crate::error::Result;
use crate::models::{Collection, Record, RecordId};
use crate::util::LocalIdGenerator;

/// Process-durable key/value mirror of every collection.
///
/// Besides the slots it remembers which cached ids were created on this
/// device and never accepted by the remote store. Only those are offered for
/// migration; every other cached row is a mirror of something remote.
pub struct LocalCache {
    db: Mutex<Database>,
    path: Option<PathBuf>,
    ids: LocalIdGenerator,
}

impl LocalCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::open(&path)?;
        Ok(Self {
            db: Mutex::new(db),
            path: Some(path),
            ids: LocalIdGenerator::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Mutex::new(Database::open_in_memory()?),
            path: None,
            ids: LocalIdGenerator::new(),
        })
    }

    /// Open at `path`, falling back to a process-lifetime in-memory cache when
    /// the file cannot be opened.
    pub fn open_or_memory(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(cache) => Ok(cache),
            Err(error) => {
                tracing::warn!(
                    "Failed to open local cache at {}: {}. Falling back to in-memory cache.",
                    path.display(),
                    error
                );
                Self::open_in_memory()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh id for a record created on this device.
    pub fn next_local_id(&self) -> RecordId {
        RecordId::Int(self.ids.next_id())
    }

    /// Last stored sequence for `collection`, in stored order.
    pub fn read(&self, collection: Collection) -> Vec<Record> {
        let db = self.lock();
        self.load_slot(&db, collection)
    }

    /// Decode a slot. Rows stored without an id were written offline before
    /// ids existed: they get a local id, are written back and marked local.
    fn load_slot(&self, db: &Database, collection: Collection) -> Vec<Record> {
        let slot = read_slot(db, collection, &self.ids);
        if !slot.adopted.is_empty() {
            tracing::info!(
                "Assigned local ids to {} cached {} records stored without one",
                slot.adopted.len(),
                collection
            );
            write_slot(db, collection, &slot.records);
            for id in &slot.adopted {
                if let Err(error) = insert_marker(db, collection, id) {
                    tracing::warn!("Failed to mark {} {} as local: {}", collection, id, error);
                }
            }
        }
        slot.records
    }

    /// Replace the stored sequence for `collection`.
    pub fn write(&self, collection: Collection, records: &[Record]) {
        let db = self.lock();
        write_slot(&db, collection, records);
    }

    /// Read, modify and write back a slot without another handle of this
    /// cache interleaving.
    pub fn update<T>(&self, collection: Collection, f: impl FnOnce(&mut Vec<Record>) -> T) -> T {
        let db = self.lock();
        let mut records = self.load_slot(&db, collection);
        let result = f(&mut records);
        write_slot(&db, collection, &records);
        result
    }

    /// Number of writes the slot has seen, across every handle on the same
    /// database file. `0` for a slot never written.
    pub fn revision(&self, collection: Collection) -> u64 {
        let db = self.lock();
        let revision = db
            .connection()
            .query_row(
                "SELECT revision FROM cache_slots WHERE slot = ?",
                params![collection.slot()],
                |row| row.get::<_, i64>(0),
            )
            .optional();

        match revision {
            Ok(revision) => revision.map_or(0, |value| u64::try_from(value).unwrap_or(0)),
            Err(error) => {
                tracing::warn!(
                    "Failed to read revision of cache slot {}: {}",
                    collection.slot(),
                    error
                );
                0
            }
        }
    }

    /// Empty the slot (still counts as a write).
    pub fn clear(&self, collection: Collection) {
        self.write(collection, &[]);
    }

    /// Remember a locally deleted id so remote listings that still carry it
    /// are filtered.
    pub fn add_tombstone(&self, collection: Collection, id: &RecordId) {
        let result = encode_id(id).and_then(|id| {
            let now = chrono::Utc::now().timestamp_millis();
            self.lock().connection().execute(
                "INSERT OR REPLACE INTO tombstones (slot, record_id, deleted_at) VALUES (?, ?, ?)",
                params![collection.slot(), id, now],
            )?;
            Ok(())
        });
        if let Err(error) = result {
            tracing::warn!("Failed to record deletion of {} {}: {}", collection, id, error);
        }
    }

    pub fn remove_tombstone(&self, collection: Collection, id: &RecordId) {
        let result = encode_id(id).and_then(|id| {
            self.lock().connection().execute(
                "DELETE FROM tombstones WHERE slot = ? AND record_id = ?",
                params![collection.slot(), id],
            )?;
            Ok(())
        });
        if let Err(error) = result {
            tracing::warn!("Failed to clear deletion of {} {}: {}", collection, id, error);
        }
    }

    pub fn tombstones(&self, collection: Collection) -> HashSet<RecordId> {
        match self.try_tombstones(collection) {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!("Failed to read deletions of {}: {}", collection, error);
                HashSet::new()
            }
        }
    }

    fn try_tombstones(&self, collection: Collection) -> Result<HashSet<RecordId>> {
        select_ids(
            &self.lock(),
            "SELECT record_id FROM tombstones WHERE slot = ?",
            collection,
        )
    }

    /// Remember that `id` was created here and has no remote counterpart yet.
    pub fn mark_local(&self, collection: Collection, id: &RecordId) {
        if let Err(error) = insert_marker(&self.lock(), collection, id) {
            tracing::warn!("Failed to mark {} {} as local: {}", collection, id, error);
        }
    }

    /// Forget the local mark of `id`, typically once the remote store has
    /// accepted it under a canonical id.
    pub fn unmark_local(&self, collection: Collection, id: &RecordId) {
        let result = encode_id(id).and_then(|id| {
            self.lock().connection().execute(
                "DELETE FROM local_records WHERE slot = ? AND record_id = ?",
                params![collection.slot(), id],
            )?;
            Ok(())
        });
        if let Err(error) = result {
            tracing::warn!("Failed to unmark local {} {}: {}", collection, id, error);
        }
    }

    pub fn is_local(&self, collection: Collection, id: &RecordId) -> bool {
        self.local_ids(collection).contains(id)
    }

    /// Ids created on this device that still await the remote store.
    pub fn local_ids(&self, collection: Collection) -> HashSet<RecordId> {
        let ids = select_ids(
            &self.lock(),
            "SELECT record_id FROM local_records WHERE slot = ?",
            collection,
        );
        match ids {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!("Failed to read local marks of {}: {}", collection, error);
                HashSet::new()
            }
        }
    }
}

fn encode_id(id: &RecordId) -> Result<String> {
    Ok(serde_json::to_string(id)?)
}

fn insert_marker(db: &Database, collection: Collection, id: &RecordId) -> Result<()> {
    let id = encode_id(id)?;
    let now = chrono::Utc::now().timestamp_millis();
    db.connection().execute(
        "INSERT OR IGNORE INTO local_records (slot, record_id, marked_at) VALUES (?, ?, ?)",
        params![collection.slot(), id, now],
    )?;
    Ok(())
}

fn select_ids(db: &Database, sql: &str, collection: Collection) -> Result<HashSet<RecordId>> {
    let mut stmt = db.connection().prepare(sql)?;
    let encoded = stmt
        .query_map(params![collection.slot()], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(encoded
        .iter()
        .filter_map(|id| serde_json::from_str(id).ok())
        .collect())
}

#[derive(Default)]
struct Slot {
    records: Vec<Record>,
    /// Ids just assigned to rows stored without one.
    adopted: Vec<RecordId>,
}

fn read_slot(db: &Database, collection: Collection, ids: &LocalIdGenerator) -> Slot {
    let payload = match read_payload(db, collection) {
        Ok(Some(payload)) => payload,
        Ok(None) => return Slot::default(),
        Err(error) => {
            tracing::warn!("Failed to read cache slot {}: {}", collection.slot(), error);
            return Slot::default();
        }
    };

    let rows = match serde_json::from_str::<Vec<Value>>(&payload) {
        Ok(rows) => rows,
        Err(error) => {
            tracing::warn!(
                "Cache slot {} holds invalid JSON, treating as empty: {}",
                collection.slot(),
                error
            );
            return Slot::default();
        }
    };

    let total = rows.len();
    let mut slot = Slot::default();
    for row in rows {
        match row {
            Value::Object(fields) if !matches!(fields.get("id"), Some(id) if !id.is_null()) => {
                let record = Record::new(ids.next_id(), fields);
                slot.adopted.push(record.id.clone());
                slot.records.push(record);
            }
            row => slot.records.extend(Record::from_value(row)),
        }
    }
    if slot.records.len() < total {
        tracing::warn!(
            "Skipped {} malformed rows in cache slot {}",
            total - slot.records.len(),
            collection.slot()
        );
    }
    slot
}

fn read_payload(db: &Database, collection: Collection) -> Result<Option<String>> {
    let payload = db
        .connection()
        .query_row(
            "SELECT payload FROM cache_slots WHERE slot = ?",
            params![collection.slot()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(payload)
}

fn write_slot(db: &Database, collection: Collection, records: &[Record]) {
    if let Err(error) = try_write_slot(db, collection, records) {
        tracing::warn!("Failed to write cache slot {}: {}", collection.slot(), error);
    }
}

fn try_write_slot(db: &Database, collection: Collection, records: &[Record]) -> Result<()> {
    let payload = serde_json::to_string(records)?;
    let now = chrono::Utc::now().timestamp_millis();
    db.connection().execute(
        "INSERT INTO cache_slots (slot, payload, revision, updated_at) VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(slot) DO UPDATE SET
            payload = excluded.payload,
            revision = cache_slots.revision + 1,
            updated_at = excluded.updated_at",
        params![collection.slot(), payload, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn unwritten_slot_reads_empty() {
        let cache = LocalCache::open_in_memory().unwrap();
        assert!(cache.read(Collection::Notices).is_empty());
        assert_eq!(cache.revision(Collection::Notices), 0);
    }

    #[test]
    fn write_then_read_preserves_order() {
        let cache = LocalCache::open_in_memory().unwrap();
        let records = vec![
            record(json!({"id": 2, "title": "Second"})),
            record(json!({"id": 1, "title": "First"})),
        ];
        cache.write(Collection::Notices, &records);
        assert_eq!(cache.read(Collection::Notices), records);
        assert!(cache.read(Collection::Events).is_empty());
    }

    #[test]
    fn every_write_bumps_revision() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache.write(Collection::Members, &[]);
        cache.write(Collection::Members, &[record(json!({"id": 1}))]);
        cache.clear(Collection::Members);
        assert_eq!(cache.revision(Collection::Members), 3);
        assert!(cache.read(Collection::Members).is_empty());
    }

    #[test]
    fn corrupt_slot_reads_empty() {
        let cache = LocalCache::open_in_memory().unwrap();
        {
            let db = cache.lock();
            db.connection()
                .execute(
                    "INSERT INTO cache_slots (slot, payload, revision, updated_at) VALUES (?, ?, 1, 0)",
                    params![Collection::Content.slot(), "{not json"],
                )
                .unwrap();
        }
        assert!(cache.read(Collection::Content).is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let cache = LocalCache::open_in_memory().unwrap();
        {
            let db = cache.lock();
            db.connection()
                .execute(
                    "INSERT INTO cache_slots (slot, payload, revision, updated_at) VALUES (?, ?, 1, 0)",
                    params![
                        Collection::Events.slot(),
                        r#"[{"id": 1, "title": "ok"}, {"title": "no id"}, 5]"#
                    ],
                )
                .unwrap();
        }
        let records = cache.read(Collection::Events);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("title").as_deref(), Some("ok"));
        assert_eq!(records[1].text("title").as_deref(), Some("no id"));
        assert!(matches!(records[1].id, RecordId::Int(id) if id > 0));
    }

    #[test]
    fn rows_without_id_keep_their_adopted_id() {
        let cache = LocalCache::open_in_memory().unwrap();
        {
            let db = cache.lock();
            db.connection()
                .execute(
                    "INSERT INTO cache_slots (slot, payload, revision, updated_at) VALUES (?, ?, 1, 0)",
                    params![
                        Collection::Notices.slot(),
                        r#"[{"title": "Fasting Friday", "id": null}]"#
                    ],
                )
                .unwrap();
        }

        let first = cache.read(Collection::Notices);
        let second = cache.read(Collection::Notices);
        assert_eq!(first, second);
        assert_eq!(
            cache.local_ids(Collection::Notices),
            HashSet::from([first[0].id.clone()])
        );
        assert!(cache.local_ids(Collection::Events).is_empty());
    }

    #[test]
    fn local_marks_are_per_slot() {
        let cache = LocalCache::open_in_memory().unwrap();
        let kept = cache.next_local_id();
        let dropped = cache.next_local_id();
        assert_ne!(kept, dropped);

        cache.mark_local(Collection::Members, &kept);
        cache.mark_local(Collection::Members, &dropped);
        cache.mark_local(Collection::Members, &kept);
        cache.mark_local(Collection::Events, &RecordId::Int(1));
        assert_eq!(cache.local_ids(Collection::Members).len(), 2);

        cache.unmark_local(Collection::Members, &dropped);
        assert!(cache.is_local(Collection::Members, &kept));
        assert!(!cache.is_local(Collection::Members, &dropped));
        assert!(cache.is_local(Collection::Events, &RecordId::Int(1)));

        cache.unmark_local(Collection::Members, &kept);
        assert!(cache.local_ids(Collection::Members).is_empty());
    }

    #[test]
    fn separate_handles_observe_each_other() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cache.db");
        let writer = LocalCache::open(&path).unwrap();
        let reader = LocalCache::open(&path).unwrap();

        writer.write(Collection::Members, &[record(json!({"id": 1, "name": "Ana"}))]);

        assert_eq!(reader.revision(Collection::Members), 1);
        assert_eq!(reader.read(Collection::Members).len(), 1);
    }

    #[test]
    fn update_is_read_modify_write() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache.write(Collection::Notices, &[record(json!({"id": 1, "title": "a"}))]);
        let len = cache.update(Collection::Notices, |records| {
            records.insert(0, record(json!({"id": 2, "title": "b"})));
            records.len()
        });
        assert_eq!(len, 2);
        assert_eq!(cache.read(Collection::Notices)[0].id, RecordId::Int(2));
        assert_eq!(cache.revision(Collection::Notices), 2);
    }

    #[test]
    fn tombstones_keep_id_types() {
        let cache = LocalCache::open_in_memory().unwrap();
        cache.add_tombstone(Collection::Events, &RecordId::Int(4));
        cache.add_tombstone(Collection::Events, &RecordId::from("4"));
        cache.add_tombstone(Collection::Members, &RecordId::Int(9));

        let events = cache.tombstones(Collection::Events);
        assert_eq!(events.len(), 2);
        assert!(events.contains(&RecordId::Int(4)));
        assert!(events.contains(&RecordId::Text("4".to_string())));

        cache.remove_tombstone(Collection::Events, &RecordId::Int(4));
        assert_eq!(cache.tombstones(Collection::Events).len(), 1);
        assert_eq!(cache.tombstones(Collection::Members).len(), 1);
    }

    #[test]
    fn open_or_memory_falls_back() {
        let tmp = tempdir().unwrap();
        // A directory cannot be opened as a database file
        let cache = LocalCache::open_or_memory(tmp.path()).unwrap();
        assert!(cache.path().is_none());
        cache.write(Collection::Notices, &[record(json!({"id": 1}))]);
        assert_eq!(cache.read(Collection::Notices).len(), 1);
    }
}
