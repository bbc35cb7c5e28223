//! In-process remote store.
//!
//! Behaves like a `PostgREST` table: bigserial ids, server-stamped
//! `created_at`, ordering, windows and `ilike` filters. Faults can be
//! injected per operation, columns can be restricted to emulate an older
//! schema, and list calls can be delayed to exercise request fencing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};

use super::{ListQuery, RemoteError, RemoteResult, RemoteStore};
use crate::models::{Collection, Record, RecordId};

/// Operation a fault is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    List,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<Collection, Vec<Record>>,
    last_id: i64,
    failures: HashMap<FailOn, RemoteError>,
    columns: HashMap<Collection, HashSet<String>>,
    list_delays: VecDeque<Duration>,
    calls: HashMap<FailOn, usize>,
    insert_attempts: Vec<(Collection, Vec<Map<String, Value>>)>,
}

/// Cloneable handle; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store rows as-is. Rows without an id get the next serial id.
    pub fn seed(&self, collection: Collection, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.lock();
        for row in rows {
            let Value::Object(mut fields) = row else {
                continue;
            };
            let id = match fields.remove("id") {
                Some(Value::Number(number)) if number.as_i64().is_some() => {
                    let id = number.as_i64().unwrap_or_default();
                    state.last_id = state.last_id.max(id);
                    RecordId::Int(id)
                }
                Some(Value::String(text)) => RecordId::Text(text),
                _ => {
                    state.last_id += 1;
                    RecordId::Int(state.last_id)
                }
            };
            state
                .tables
                .entry(collection)
                .or_default()
                .push(Record::new(id, fields));
        }
    }

    /// Make every call of `op` fail with `error` until [`Self::recover`].
    pub fn fail(&self, op: FailOn, error: RemoteError) {
        self.lock().failures.insert(op, error);
    }

    pub fn recover(&self, op: FailOn) {
        self.lock().failures.remove(&op);
    }

    /// Reject writes and filters on `collection` naming columns outside
    /// `columns`.
    pub fn restrict_columns(&self, collection: Collection, columns: &[&str]) {
        self.lock().columns.insert(
            collection,
            columns.iter().map(|column| (*column).to_string()).collect(),
        );
    }

    /// Delay the next list call. Queued delays apply to successive calls.
    pub fn delay_next_list(&self, delay: Duration) {
        self.lock().list_delays.push_back(delay);
    }

    /// Stored rows in insertion order.
    pub fn rows(&self, collection: Collection) -> Vec<Record> {
        self.lock()
            .tables
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self, op: FailOn) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every insert batch received, accepted or not.
    pub fn insert_attempts(&self) -> Vec<(Collection, Vec<Map<String, Value>>)> {
        self.lock().insert_attempts.clone()
    }

    fn begin(&self, op: FailOn) -> RemoteResult<()> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        state.failures.get(&op).cloned().map_or(Ok(()), Err)
    }

    fn check_columns(
        state: &MemoryState,
        collection: Collection,
        fields: &Map<String, Value>,
    ) -> RemoteResult<()> {
        fields
            .keys()
            .try_for_each(|key| Self::check_column(state, collection, key))
    }

    fn check_column(state: &MemoryState, collection: Collection, column: &str) -> RemoteResult<()> {
        match state.columns.get(&collection) {
            Some(allowed) if !allowed.contains(column) => Err(RemoteError::SchemaMismatch(format!(
                "Could not find the '{column}' column of '{}' in the schema cache",
                collection.table()
            ))),
            _ => Ok(()),
        }
    }

    fn list_now(&self, collection: Collection, query: &ListQuery) -> Vec<Record> {
        let state = self.lock();
        let mut rows = state
            .tables
            .get(&collection)
            .cloned()
            .unwrap_or_default();
        drop(state);

        if let Some(filter) = &query.text_filter {
            rows.retain(|row| filter.matches(row));
        }
        rows.sort_by(|a, b| query.order.compare(a, b));
        rows.into_iter()
            .skip(query.range_from)
            .take(query.limit())
            .collect()
    }

    fn insert_now(
        &self,
        collection: Collection,
        rows: Vec<Map<String, Value>>,
    ) -> RemoteResult<Vec<Record>> {
        let mut state = self.lock();
        state.insert_attempts.push((collection, rows.clone()));
        for row in &rows {
            Self::check_columns(&state, collection, row)?;
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut stored = Vec::with_capacity(rows.len());
        for mut fields in rows {
            state.last_id += 1;
            fields
                .entry("created_at")
                .or_insert_with(|| Value::String(created_at.clone()));
            stored.push(Record::new(state.last_id, fields));
        }
        state
            .tables
            .entry(collection)
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    fn update_now(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> RemoteResult<Vec<Record>> {
        let mut state = self.lock();
        Self::check_columns(&state, collection, &patch)?;
        let Some(row) = state
            .tables
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|row| &row.id == id))
        else {
            return Ok(Vec::new());
        };
        for (key, value) in patch {
            if key != "id" {
                row.fields.insert(key, value);
            }
        }
        Ok(vec![row.clone()])
    }

    fn delete_now(&self, collection: Collection, id: &RecordId) {
        if let Some(rows) = self.lock().tables.get_mut(&collection) {
            rows.retain(|row| &row.id != id);
        }
    }
}

impl RemoteStore for MemoryStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> RemoteResult<Vec<Record>> {
        let delay = self.lock().list_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.begin(FailOn::List)?;
        if let Some(filter) = &query.text_filter {
            let state = self.lock();
            for column in &filter.columns {
                Self::check_column(&state, collection, column)?;
            }
        }
        Ok(self.list_now(collection, query))
    }

    async fn insert(
        &self,
        collection: Collection,
        rows: Vec<Map<String, Value>>,
    ) -> RemoteResult<Vec<Record>> {
        self.begin(FailOn::Insert)?;
        self.insert_now(collection, rows)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Map<String, Value>,
    ) -> RemoteResult<Vec<Record>> {
        self.begin(FailOn::Update)?;
        self.update_now(collection, id, patch)
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> RemoteResult<()> {
        self.begin(FailOn::Delete)?;
        self.delete_now(collection, id);
        Ok(())
    }
}
