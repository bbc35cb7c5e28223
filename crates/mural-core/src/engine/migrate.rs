//! One-way migration of cache-only records into the remote store.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::reconcile::{merge, Pending, RemoteSide};
use super::Inner;
use crate::dedup::DedupKeyResolver;
use crate::models::{Collection, Record, RecordId};
use crate::remote::{ListQuery, RemoteError, RemoteResult, RemoteStore};

/// Rows fetched per request while scanning for dedup matches.
const SCAN_CHUNK: usize = 100;

/// Outcome of one migration pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    /// Records created on this device that no remote record matched.
    pub candidates: usize,
    pub inserted: usize,
    /// Why candidates were left for a later load, if they were.
    pub deferred: Option<String>,
    /// First page of the merged view: pending local rows, then the remote page.
    pub records: Vec<Record>,
}

struct Scan {
    rows: Vec<Record>,
    /// Whether the remote listing was exhausted within the scan limit.
    complete: bool,
}

impl<R: RemoteStore> Inner<R> {
    pub(super) async fn migrate(
        &self,
        collection: Collection,
        remote_snapshot: &[Record],
    ) -> MigrationReport {
        // Concurrent loads of one collection must not migrate the same rows twice
        let _guard = match self.migrations.get(&collection) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let resolver = DedupKeyResolver::for_collection(collection);
        let size = self.config.effective_page_size();
        let deleted = self.cache.tombstones(collection);
        let page = remote_snapshot
            .iter()
            .filter(|record| !deleted.contains(&record.id))
            .cloned()
            .collect::<Vec<_>>();
        let page_ids = page.iter().map(|record| &record.id).collect::<HashSet<_>>();
        let page_keys = page
            .iter()
            .map(|record| resolver.key(record))
            .collect::<HashSet<_>>();
        // Cache, then in-flight ids, then local marks: a settling insert
        // leaves the in-flight set only after its local mark is gone
        let cached = self.cache.read(collection);
        let in_flight = self.in_flight_ids(collection);
        let local = self.cache.local_ids(collection);

        let mut candidates = cached
            .into_iter()
            .filter(|record| {
                local.contains(&record.id)
                    && !page_ids.contains(&record.id)
                    && !in_flight.contains(&record.id)
                    && !page_keys.contains(&resolver.key(record))
            })
            .collect::<Vec<_>>();

        let mut beyond = Vec::new();
        let mut deferred = None;
        // A short first page means the remote listing has nothing beyond it
        if !candidates.is_empty() && remote_snapshot.len() >= size {
            match self.scan_beyond(collection, remote_snapshot.len()).await {
                Ok(scan) => {
                    if !scan.complete {
                        deferred = Some(format!(
                            "remote holds more than {} rows to compare against",
                            self.config.migration_scan_limit
                        ));
                    }
                    beyond = scan
                        .rows
                        .into_iter()
                        .filter(|record| !deleted.contains(&record.id))
                        .collect();
                }
                Err(error) => deferred = Some(format!("remote scan failed: {error}")),
            }

            let beyond_ids = beyond.iter().map(|record| &record.id).collect::<HashSet<_>>();
            let beyond_keys = beyond
                .iter()
                .map(|record| resolver.key(record))
                .collect::<HashSet<_>>();
            candidates.retain(|record| {
                !beyond_ids.contains(&record.id) && !beyond_keys.contains(&resolver.key(record))
            });
        }

        // Colliding keys are one entity: the first row stands for all of them
        let mut keys = HashSet::new();
        candidates.retain(|record| keys.insert(resolver.key(record)));

        let mut migrated = HashMap::new();
        if !candidates.is_empty() {
            match &deferred {
                Some(reason) => tracing::warn!(
                    "Deferring migration of {} offline {} records: {}",
                    candidates.len(),
                    collection,
                    reason
                ),
                None => {
                    migrated = self.push_candidates(collection, &candidates).await;
                }
            }
        }

        let in_flight = self.in_flight_ids(collection);
        let local = self.cache.local_ids(collection);
        let accepted = self.accepted_ids(collection);
        let remote = RemoteSide {
            page: &page,
            complete: remote_snapshot.len() < size,
            beyond: &beyond,
            migrated: &migrated,
        };
        let (records, kept) = self.cache.update(collection, |current| {
            let merged = merge(
                collection.spec(),
                resolver,
                std::mem::take(current),
                &remote,
                &Pending {
                    in_flight: &in_flight,
                    local: &local,
                    accepted: &accepted,
                },
            );
            *current = merged.cache;
            let kept = current
                .iter()
                .map(|record| record.id.clone())
                .collect::<HashSet<_>>();
            (merged.view, kept)
        });
        self.forget_local(collection, &kept);
        self.forget_accepted(collection, &page);
        if !migrated.is_empty() {
            self.publish(collection);
        }

        MigrationReport {
            candidates: candidates.len(),
            inserted: migrated.len(),
            deferred,
            records,
        }
    }

    /// Drop local marks of rows that left the cache: migrated, or claimed by
    /// a remote row with the same dedup key.
    fn forget_local(&self, collection: Collection, kept: &HashSet<RecordId>) {
        let local = self.cache.local_ids(collection);
        let in_flight = self.in_flight_ids(collection);
        for id in local {
            if !kept.contains(&id) && !in_flight.contains(&id) {
                self.cache.unmark_local(collection, &id);
            }
        }
    }

    /// Batch-insert `candidates`, mapping each local id to its canonical row.
    async fn push_candidates(
        &self,
        collection: Collection,
        candidates: &[Record],
    ) -> HashMap<RecordId, Record> {
        tracing::info!(
            "Migrating {} offline {} records to the remote store",
            candidates.len(),
            collection
        );
        let payloads = candidates
            .iter()
            .map(Record::insert_payload)
            .collect::<Vec<_>>();

        match self.insert_with_shapes(collection, &payloads).await {
            Ok((rows, shape)) => {
                let migrated = candidates
                    .iter()
                    .zip(rows)
                    .map(|(local, mut canonical)| {
                        canonical.backfill_from(local);
                        (local.id.clone(), canonical)
                    })
                    .collect::<HashMap<_, _>>();
                tracing::info!(
                    "Migrated {} {} records ({} payload)",
                    migrated.len(),
                    collection,
                    shape.label()
                );
                migrated
            }
            Err(error) => {
                tracing::warn!(
                    "Migration of {} {} records failed, retrying on next load: {}",
                    candidates.len(),
                    collection,
                    error
                );
                HashMap::new()
            }
        }
    }

    /// Remote rows from offset `start` on, up to the scan limit.
    async fn scan_beyond(&self, collection: Collection, start: usize) -> RemoteResult<Scan> {
        let remote = self.remote.as_ref().ok_or(RemoteError::NotConfigured)?;
        let limit = self.config.migration_scan_limit;
        let order = collection.spec().order;
        let mut rows = Vec::new();
        let mut offset = start;

        loop {
            if rows.len() >= limit {
                return Ok(Scan {
                    rows,
                    complete: false,
                });
            }
            let take = SCAN_CHUNK.min(limit - rows.len());
            let query = ListQuery {
                order,
                range_from: offset,
                range_to: offset + take - 1,
                text_filter: None,
            };
            let batch = self.call(remote.list(collection, &query)).await?;
            let fetched = batch.len();
            rows.extend(batch);
            offset += fetched;
            if fetched < take {
                return Ok(Scan {
                    rows,
                    complete: true,
                });
            }
        }
    }
}
