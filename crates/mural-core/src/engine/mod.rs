//! Reconciliation engine
//!
//! One engine serves every collection. Reads go to the remote store when
//! one is configured and fall back to the local cache when it is absent or
//! failing. Writes land in the local cache first, then race to the remote
//! store on a spawned task. Every read takes a per-collection ticket so a
//! slow response cannot overwrite the view a newer request produced.

mod migrate;
mod pending;
mod reconcile;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::capability::Capability;
use crate::config::EngineConfig;
use crate::db::LocalCache;
use crate::error::{Error, Result};
use crate::models::{
    Collection, Payload, PayloadShape, Record, RecordId, CREATED_AT_FIELDS, LOCAL_CREATED_AT_FIELD,
};
use crate::notify::{ChangeNotifier, Topic};
use crate::remote::{ListQuery, RemoteError, RemoteResult, RemoteStore};
use crate::search::SearchQuery;
use crate::state::{LoadPhase, PageView, Source};
use crate::util::today_iso;

pub use migrate::MigrationReport;
pub use pending::PendingWrite;

/// Offline-first front door to every collection. Clones share state.
pub struct Engine<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Local edits made to a record while its remote insert is running. They
/// are replayed against the canonical id once the insert settles.
#[derive(Debug, Default)]
struct InFlight {
    deleted: bool,
    patch: Map<String, Value>,
}

#[derive(Debug, Default)]
struct CollectionState {
    phase: LoadPhase,
    view: PageView,
    ticket: u64,
}

struct Inner<R> {
    remote: Option<R>,
    cache: Arc<LocalCache>,
    notifier: ChangeNotifier,
    config: EngineConfig,
    states: Mutex<HashMap<Collection, CollectionState>>,
    in_flight: Mutex<HashMap<(Collection, RecordId), InFlight>>,
    /// Canonical ids of settled inserts, until a listing shows them.
    accepted: Mutex<HashSet<(Collection, RecordId)>>,
    migrations: HashMap<Collection, tokio::sync::Mutex<()>>,
}

impl<R: RemoteStore> Engine<R> {
    /// `remote` is `None` when no remote store is configured; the engine then
    /// serves and stores everything locally.
    pub fn new(remote: Option<R>, cache: Arc<LocalCache>, config: EngineConfig) -> Self {
        Self::with_notifier(remote, cache, ChangeNotifier::new(), config)
    }

    pub fn with_notifier(
        remote: Option<R>,
        cache: Arc<LocalCache>,
        notifier: ChangeNotifier,
        config: EngineConfig,
    ) -> Self {
        let capability = if remote.is_some() {
            Capability::RemoteAvailable
        } else {
            Capability::LocalOnly
        };
        tracing::debug!("Engine starting in {} mode", capability.label());

        Self {
            inner: Arc::new(Inner {
                remote,
                cache,
                notifier,
                config,
                states: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                accepted: Mutex::new(HashSet::new()),
                migrations: Collection::ALL
                    .into_iter()
                    .map(|collection| (collection, tokio::sync::Mutex::new(())))
                    .collect(),
            }),
        }
    }

    pub fn capability(&self) -> Capability {
        if self.inner.remote.is_some() {
            Capability::RemoteAvailable
        } else {
            Capability::LocalOnly
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.inner.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn phase(&self, collection: Collection) -> LoadPhase {
        self.inner.with_state(collection, |state| state.phase)
    }

    /// Current live view of `collection`.
    pub fn view(&self, collection: Collection) -> PageView {
        self.inner.with_state(collection, |state| state.view.clone())
    }

    /// Full cached sequence, for aggregating views.
    pub fn snapshot(&self, collection: Collection) -> Vec<Record> {
        self.inner.cache.read(collection)
    }

    /// First page of `collection`, reconciled with the remote store when
    /// possible.
    pub async fn load(&self, collection: Collection) -> Result<PageView> {
        let (ticket, _) = self.inner.issue_ticket(collection);
        let size = self.inner.config.effective_page_size();

        if let Some(remote) = &self.inner.remote {
            let query = ListQuery::page(collection.spec().order, 0, size);
            match self.inner.call(remote.list(collection, &query)).await {
                Ok(page) => return self.inner.reconcile(collection, ticket, page).await,
                Err(error) => tracing::warn!(
                    "Loading {} from remote failed, serving local cache: {}",
                    collection,
                    error
                ),
            }
        }

        self.inner
            .serve_local(collection, ticket, &SearchQuery::all())
    }

    /// Push cache-only records of `collection` to the remote store.
    ///
    /// `remote_snapshot` is the first remote page in collection order. Never
    /// fails: problems are logged and the migration is retried on the next
    /// load.
    pub async fn migrate(
        &self,
        collection: Collection,
        remote_snapshot: &[Record],
    ) -> MigrationReport {
        self.inner.migrate(collection, remote_snapshot).await
    }

    /// Next page of the current listing or search.
    pub async fn load_more(&self, collection: Collection, query: &SearchQuery) -> Result<PageView> {
        let (ticket, _) = self.inner.issue_ticket(collection);
        let page = self.inner.with_state(collection, |state| state.view.page);

        if self.inner.remote.is_some() {
            match self.inner.remote_page(collection, query, page).await {
                Ok(raw) => {
                    return self
                        .inner
                        .append_remote(collection, ticket, query, page, &raw)
                }
                Err(error) => tracing::warn!(
                    "Loading more {} from remote failed, paging local cache: {}",
                    collection,
                    error
                ),
            }
        }

        self.inner.append_local(collection, ticket, query, page)
    }

    /// First page of records matching `query`. Remote failures surface.
    pub async fn search(&self, collection: Collection, query: &SearchQuery) -> Result<PageView> {
        if query.is_empty() {
            return self.load(collection).await;
        }

        let (ticket, previous) = self.inner.issue_ticket(collection);
        if self.inner.remote.is_none() {
            return self.inner.serve_local(collection, ticket, query);
        }

        match self.inner.remote_page(collection, query, 0).await {
            Ok(raw) => {
                let size = self.inner.config.effective_page_size();
                let has_more = raw.len() == size;
                let records = self.inner.visible(collection, query, raw);
                self.inner
                    .commit(collection, ticket, LoadPhase::Loaded, |view| {
                        *view = PageView {
                            records,
                            page: 1,
                            has_more,
                            source: Source::Remote,
                        };
                    })
            }
            Err(error) => {
                self.inner.restore_phase(collection, ticket, previous);
                if !self.inner.is_current(collection, ticket) {
                    return Err(Error::Superseded { collection, ticket });
                }
                tracing::warn!("Search in {} failed: {}", collection, error);
                Err(Error::Remote(error))
            }
        }
    }

    /// Insert a typed payload into its collection.
    pub fn insert_payload<P: Payload>(&self, payload: P) -> Result<PendingWrite<Record>> {
        self.insert(P::COLLECTION, payload.into_fields()?)
    }

    /// Commit a new record locally and publish it, then attempt the remote
    /// insert in the background.
    pub fn insert(
        &self,
        collection: Collection,
        mut fields: Map<String, Value>,
    ) -> Result<PendingWrite<Record>> {
        validate_mandatory(collection, &fields)?;
        fields.remove("id");
        for field in CREATED_AT_FIELDS {
            fields.remove(field);
        }
        fields.insert(
            LOCAL_CREATED_AT_FIELD.to_string(),
            Value::String(today_iso()),
        );

        let record = Record::new(self.inner.cache.next_local_id(), fields);
        let online = self.inner.remote.is_some();
        // Marked before the row is cached so migration never offers it twice
        if online {
            self.inner.mark_in_flight(collection, &record.id);
        }
        self.inner.cache.mark_local(collection, &record.id);

        let order = collection.spec().order;
        self.inner
            .cache
            .update(collection, |records| order.place(records, record.clone()));
        self.inner.with_state(collection, |state| {
            order.place(&mut state.view.records, record.clone());
        });
        self.inner.publish(collection);
        tracing::debug!("Inserted {} {} locally", collection, record.id);

        if !online {
            return Ok(PendingWrite::settled(record));
        }

        let inner = Arc::clone(&self.inner);
        let optimistic = record.clone();
        let task = tokio::spawn(async move { inner.push_insert(collection, optimistic).await });
        Ok(PendingWrite::new(record, task))
    }

    /// Patch a record locally and publish, then attempt the remote update.
    ///
    /// The local value is `None` when the id is not cached; the remote
    /// update is attempted regardless. Records the remote store has not
    /// accepted yet are only patched locally: a running insert replays the
    /// patch on its canonical row, migration pushes the patched row.
    pub fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        mut patch: Map<String, Value>,
    ) -> PendingWrite<Option<Record>> {
        patch.remove("id");
        let order = collection.spec().order;
        let mut in_flight = self.inner.in_flight();
        let updated = self.inner.cache.update(collection, |records| {
            let updated = apply_patch(records, id, &patch);
            order.sort(records);
            updated
        });
        self.inner.with_state(collection, |state| {
            apply_patch(&mut state.view.records, id, &patch);
            order.sort(&mut state.view.records);
        });
        let queued = match in_flight.get_mut(&(collection, id.clone())) {
            Some(edits) => {
                edits.patch.extend(patch.clone());
                true
            }
            None => false,
        };
        drop(in_flight);
        if updated.is_some() {
            self.inner.publish(collection);
        }

        if queued {
            tracing::debug!("Update of {} {} waits for its insert", collection, id);
            return PendingWrite::settled(updated);
        }
        if self.inner.remote.is_none() || self.inner.cache.is_local(collection, id) {
            return PendingWrite::settled(updated);
        }

        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        let local = updated.clone();
        let task = tokio::spawn(async move { inner.push_update(collection, id, patch, local).await });
        PendingWrite::new(updated, task)
    }

    /// Remove a record locally and publish, then attempt the remote delete.
    ///
    /// The local removal stands even when the remote delete fails; the id is
    /// remembered so remote listings that still carry it are filtered. A
    /// record whose insert is still running is deleted remotely under its
    /// canonical id once that insert settles.
    pub fn delete(&self, collection: Collection, id: &RecordId) -> PendingWrite<bool> {
        let mut in_flight = self.inner.in_flight();
        let removed = self.inner.remove(collection, id);
        let queued = match in_flight.get_mut(&(collection, id.clone())) {
            Some(edits) => {
                edits.deleted = true;
                true
            }
            None => false,
        };
        drop(in_flight);
        if removed {
            self.inner.publish(collection);
        }

        let local = self.inner.cache.is_local(collection, id);
        if local {
            self.inner.cache.unmark_local(collection, id);
        }
        if queued {
            tracing::debug!("Delete of {} {} waits for its insert", collection, id);
            return PendingWrite::settled(removed);
        }
        if self.inner.remote.is_none() || local {
            return PendingWrite::settled(removed);
        }

        self.inner.cache.add_tombstone(collection, id);
        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        let task = tokio::spawn(async move {
            inner.push_delete(collection, &id).await;
            removed
        });
        PendingWrite::new(removed, task)
    }
}

impl<R: RemoteStore> Inner<R> {
    fn states(&self) -> MutexGuard<'_, HashMap<Collection, CollectionState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<T>(&self, collection: Collection, f: impl FnOnce(&mut CollectionState) -> T) -> T {
        f(self.states().entry(collection).or_default())
    }

    /// New request ticket; returns it with the phase it replaced.
    fn issue_ticket(&self, collection: Collection) -> (u64, LoadPhase) {
        self.with_state(collection, |state| {
            state.ticket += 1;
            let previous = state.phase;
            state.phase = LoadPhase::Loading;
            (state.ticket, previous)
        })
    }

    fn is_current(&self, collection: Collection, ticket: u64) -> bool {
        self.with_state(collection, |state| state.ticket == ticket)
    }

    fn set_phase(&self, collection: Collection, ticket: u64, phase: LoadPhase) {
        self.with_state(collection, |state| {
            if state.ticket == ticket {
                state.phase = phase;
            }
        });
    }

    fn restore_phase(&self, collection: Collection, ticket: u64, previous: LoadPhase) {
        self.set_phase(collection, ticket, previous);
    }

    /// Apply a response to the view if `ticket` is still the latest request.
    fn commit(
        &self,
        collection: Collection,
        ticket: u64,
        phase: LoadPhase,
        apply: impl FnOnce(&mut PageView),
    ) -> Result<PageView> {
        self.with_state(collection, |state| {
            if state.ticket != ticket {
                tracing::debug!(
                    "Discarding stale {} response #{} (latest #{})",
                    collection,
                    ticket,
                    state.ticket
                );
                return Err(Error::Superseded { collection, ticket });
            }
            apply(&mut state.view);
            state.phase = phase;
            Ok(state.view.clone())
        })
    }

    fn publish(&self, collection: Collection) {
        self.notifier.publish(&Topic::updated(collection));
    }

    /// Run a remote call under the configured timeout.
    async fn call<T>(&self, request: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let timeout = self.config.remote_timeout();
        tokio::time::timeout(timeout, request)
            .await
            .unwrap_or_else(|_| {
                Err(RemoteError::Transport(format!(
                    "timed out after {}ms",
                    timeout.as_millis()
                )))
            })
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<(Collection, RecordId), InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_in_flight(&self, collection: Collection, id: &RecordId) {
        self.in_flight()
            .insert((collection, id.clone()), InFlight::default());
    }

    fn in_flight_ids(&self, collection: Collection) -> HashSet<RecordId> {
        self.in_flight()
            .keys()
            .filter(|(owner, _)| *owner == collection)
            .map(|(_, id)| id.clone())
            .collect()
    }

    fn accepted(&self) -> MutexGuard<'_, HashSet<(Collection, RecordId)>> {
        self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accepted_ids(&self, collection: Collection) -> HashSet<RecordId> {
        self.accepted()
            .iter()
            .filter(|(owner, _)| *owner == collection)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Rows a listing has shown are ordinary remote rows from now on.
    fn forget_accepted(&self, collection: Collection, listed: &[Record]) {
        let mut accepted = self.accepted();
        for record in listed {
            accepted.remove(&(collection, record.id.clone()));
        }
    }

    /// Serve the first page of `query` from the local cache.
    fn serve_local(
        &self,
        collection: Collection,
        ticket: u64,
        query: &SearchQuery,
    ) -> Result<PageView> {
        let size = self.config.effective_page_size();
        let filtered = query.filter(collection.spec(), &self.cache.read(collection));
        let has_more = filtered.len() > size;
        let records = filtered.into_iter().take(size).collect();
        self.commit(collection, ticket, LoadPhase::Degraded, |view| {
            *view = PageView {
                records,
                page: 1,
                has_more,
                source: Source::Local,
            };
        })
    }

    async fn reconcile(
        &self,
        collection: Collection,
        ticket: u64,
        page: Vec<Record>,
    ) -> Result<PageView> {
        if !self.is_current(collection, ticket) {
            return Err(Error::Superseded { collection, ticket });
        }

        let has_more = page.len() == self.config.effective_page_size();
        self.set_phase(collection, ticket, LoadPhase::Migrating);
        let report = self.migrate(collection, &page).await;

        self.commit(collection, ticket, LoadPhase::Loaded, |view| {
            *view = PageView {
                records: report.records,
                page: 1,
                has_more,
                source: Source::Remote,
            };
        })
    }

    /// One remote window of `query`. Multi-column text filters the store
    /// rejects are retried on the first searchable column alone.
    async fn remote_page(
        &self,
        collection: Collection,
        query: &SearchQuery,
        page: usize,
    ) -> RemoteResult<Vec<Record>> {
        let remote = self.remote.as_ref().ok_or(RemoteError::NotConfigured)?;
        let spec = collection.spec();
        let base = ListQuery::page(spec.order, page, self.config.effective_page_size());

        let Some(filter) = query.text_filter(spec.search_columns) else {
            return self.call(remote.list(collection, &base)).await;
        };
        let filtered = base.clone().with_filter(Some(filter));
        match self.call(remote.list(collection, &filtered)).await {
            Err(error) if error.is_rejection() && spec.search_columns.len() > 1 => {
                tracing::debug!(
                    "Multi-column search in {} rejected, retrying on {}: {}",
                    collection,
                    spec.search_columns[0],
                    error
                );
                let single = base.with_filter(query.text_filter(&spec.search_columns[..1]));
                self.call(remote.list(collection, &single)).await
            }
            result => result,
        }
    }

    /// Remote rows as the view should show them: filtered client-side and
    /// without locally deleted ids.
    fn visible(&self, collection: Collection, query: &SearchQuery, raw: Vec<Record>) -> Vec<Record> {
        let deleted = self.cache.tombstones(collection);
        let rows = raw
            .into_iter()
            .filter(|record| !deleted.contains(&record.id))
            .collect::<Vec<_>>();
        query.filter(collection.spec(), &rows)
    }

    fn append_remote(
        &self,
        collection: Collection,
        ticket: u64,
        query: &SearchQuery,
        page: usize,
        raw: &[Record],
    ) -> Result<PageView> {
        if !self.is_current(collection, ticket) {
            return Err(Error::Superseded { collection, ticket });
        }

        let has_more = raw.len() == self.config.effective_page_size();
        let rows = self.visible(collection, query, raw.to_vec());
        self.mirror(collection, &rows);

        self.commit(collection, ticket, LoadPhase::Loaded, |view| {
            append_unique(&mut view.records, rows);
            view.page = page + 1;
            view.has_more = has_more;
            view.source = Source::Remote;
        })
    }

    fn append_local(
        &self,
        collection: Collection,
        ticket: u64,
        query: &SearchQuery,
        page: usize,
    ) -> Result<PageView> {
        let size = self.config.effective_page_size();
        let filtered = query.filter(collection.spec(), &self.cache.read(collection));
        let start = (page * size).min(filtered.len());
        let consumed = ((page + 1) * size).min(filtered.len());
        let has_more = filtered.len() > consumed;
        let next = filtered[start..consumed].to_vec();

        self.commit(collection, ticket, LoadPhase::Degraded, |view| {
            append_unique(&mut view.records, next);
            view.page = page + 1;
            view.has_more = has_more;
            view.source = Source::Local;
        })
    }

    /// Merge fetched remote rows into the cache, replacing stale copies.
    fn mirror(&self, collection: Collection, rows: &[Record]) {
        let order = collection.spec().order;
        self.cache.update(collection, |cached| {
            for row in rows {
                if let Some(existing) = cached.iter_mut().find(|existing| existing.id == row.id) {
                    existing.clone_from(row);
                } else if order.column == "id" {
                    cached.push(row.clone());
                } else {
                    order.place(cached, row.clone());
                }
            }
        });
    }

    fn remove(&self, collection: Collection, id: &RecordId) -> bool {
        let removed = self
            .cache
            .update(collection, |records| remove_id(records, id));
        self.with_state(collection, |state| {
            remove_id(&mut state.view.records, id);
        });
        removed
    }

    /// Replace the row `id` in cache and view. Rows deleted meanwhile stay
    /// deleted.
    fn replace(&self, collection: Collection, id: &RecordId, record: &Record) -> bool {
        let replaced = self
            .cache
            .update(collection, |records| replace_id(records, id, record));
        self.with_state(collection, |state| {
            replace_id(&mut state.view.records, id, record);
        });
        replaced
    }

    /// Try each payload shape in order until the store accepts one. Only
    /// rejections move on to the next shape.
    async fn insert_with_shapes(
        &self,
        collection: Collection,
        payloads: &[Map<String, Value>],
    ) -> RemoteResult<(Vec<Record>, PayloadShape)> {
        let remote = self.remote.as_ref().ok_or(RemoteError::NotConfigured)?;
        let mut last_error = RemoteError::NotConfigured;

        for shape in collection.spec().shapes {
            let rows = payloads
                .iter()
                .map(|payload| shape.project(payload))
                .collect::<Vec<_>>();
            match self.call(remote.insert(collection, rows)).await {
                Ok(inserted) => return Ok((inserted, *shape)),
                Err(error) if error.is_rejection() => {
                    tracing::debug!(
                        "Remote rejected {} insert with {} payload: {}",
                        collection,
                        shape.label(),
                        error
                    );
                    last_error = error;
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error)
    }

    async fn push_insert(&self, collection: Collection, optimistic: Record) -> Record {
        let payload = optimistic.insert_payload();
        let result = self
            .insert_with_shapes(collection, std::slice::from_ref(&payload))
            .await;
        let key = (collection, optimistic.id.clone());

        let accepted = match result {
            Ok((rows, shape)) => {
                let first = rows.into_iter().next();
                match &first {
                    Some(canonical) => tracing::debug!(
                        "Remote accepted {} {} as {} ({} payload)",
                        collection,
                        optimistic.id,
                        canonical.id,
                        shape.label()
                    ),
                    None => tracing::warn!(
                        "Remote insert into {} returned no row, keeping local record {}",
                        collection,
                        optimistic.id
                    ),
                }
                first
            }
            Err(error) => {
                tracing::warn!(
                    "Remote insert into {} failed, keeping local record {}: {}",
                    collection,
                    optimistic.id,
                    error
                );
                None
            }
        };

        let Some(mut canonical) = accepted else {
            // The row stays marked local and migrates on a later load
            let edits = self.in_flight().remove(&key).unwrap_or_default();
            let mut settled = optimistic;
            settled.fields.extend(edits.patch);
            return settled;
        };

        canonical.backfill_from(&optimistic);
        let (edits, replaced) = {
            let mut in_flight = self.in_flight();
            let edits = in_flight.remove(&key).unwrap_or_default();
            canonical.fields.extend(edits.patch.clone());
            let replaced = if edits.deleted {
                self.cache.add_tombstone(collection, &canonical.id);
                false
            } else {
                self.accepted().insert((collection, canonical.id.clone()));
                self.replace(collection, &optimistic.id, &canonical)
            };
            self.cache.unmark_local(collection, &optimistic.id);
            drop(in_flight);
            (edits, replaced)
        };
        if replaced {
            self.publish(collection);
        }

        if edits.deleted {
            tracing::debug!(
                "{} {} was deleted while its insert ran, deleting {} remotely",
                collection,
                optimistic.id,
                canonical.id
            );
            self.push_delete(collection, &canonical.id).await;
            // A load that listed the row before the delete may have cached it
            if self.remove(collection, &canonical.id) {
                self.publish(collection);
            }
            return canonical;
        }
        if edits.patch.is_empty() {
            return canonical;
        }

        let id = canonical.id.clone();
        self.push_update(collection, id, edits.patch, Some(canonical.clone()))
            .await
            .unwrap_or(canonical)
    }

    async fn push_update(
        &self,
        collection: Collection,
        id: RecordId,
        patch: Map<String, Value>,
        local: Option<Record>,
    ) -> Option<Record> {
        let Some(remote) = self.remote.as_ref() else {
            return local;
        };

        match self.call(remote.update(collection, &id, patch)).await {
            Ok(rows) => match rows.into_iter().next() {
                Some(mut canonical) => {
                    if let Some(local) = &local {
                        canonical.backfill_from(local);
                    }
                    if self.replace(collection, &id, &canonical) {
                        self.publish(collection);
                    }
                    Some(canonical)
                }
                None => local,
            },
            Err(error) => {
                tracing::warn!("Remote update of {} {} failed: {}", collection, id, error);
                local
            }
        }
    }

    async fn push_delete(&self, collection: Collection, id: &RecordId) {
        let Some(remote) = self.remote.as_ref() else {
            return;
        };

        match self.call(remote.delete(collection, id)).await {
            Ok(()) => self.cache.remove_tombstone(collection, id),
            Err(error) => tracing::warn!(
                "Remote delete of {} {} failed, removed locally only: {}",
                collection,
                id,
                error
            ),
        }
    }
}

fn validate_mandatory(collection: Collection, fields: &Map<String, Value>) -> Result<()> {
    for field in collection.spec().mandatory {
        let present = match fields.get(*field) {
            Some(Value::String(value)) => !value.trim().is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !present {
            return Err(Error::InvalidInput(format!(
                "{collection} require a non-empty {field}"
            )));
        }
    }
    Ok(())
}

fn apply_patch(records: &mut [Record], id: &RecordId, patch: &Map<String, Value>) -> Option<Record> {
    let record = records.iter_mut().find(|record| &record.id == id)?;
    for (key, value) in patch {
        record.fields.insert(key.clone(), value.clone());
    }
    Some(record.clone())
}

fn remove_id(records: &mut Vec<Record>, id: &RecordId) -> bool {
    let before = records.len();
    records.retain(|record| &record.id != id);
    records.len() != before
}

fn replace_id(records: &mut [Record], id: &RecordId, record: &Record) -> bool {
    match records.iter_mut().find(|existing| &existing.id == id) {
        Some(existing) => {
            existing.clone_from(record);
            true
        }
        None => false,
    }
}

fn append_unique(records: &mut Vec<Record>, more: Vec<Record>) {
    let mut seen = records
        .iter()
        .map(|record| record.id.clone())
        .collect::<HashSet<_>>();
    records.extend(more.into_iter().filter(|record| seen.insert(record.id.clone())));
}
