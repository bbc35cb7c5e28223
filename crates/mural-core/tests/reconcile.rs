//! Engine behaviour against the in-memory remote store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mural_core::models::DateRange;
use mural_core::remote::{FailOn, MemoryStore};
use mural_core::util::parse_date;
use mural_core::{
    Collection, Engine, EngineConfig, Error, LoadPhase, LocalCache, Record, RecordId, RemoteError,
    SearchQuery, Source, Topic,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn record(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

fn cache() -> Arc<LocalCache> {
    Arc::new(LocalCache::open_in_memory().unwrap())
}

fn online(remote: &MemoryStore, cache: Arc<LocalCache>) -> Engine<MemoryStore> {
    Engine::new(Some(remote.clone()), cache, EngineConfig::default())
}

fn titles(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.text("title"))
        .collect()
}

/// Cache `records` as if they had been created on this device while offline.
fn write_offline(cache: &LocalCache, collection: Collection, records: &[Record]) {
    cache.write(collection, records);
    for record in records {
        cache.mark_local(collection, &record.id);
    }
}

fn seed_notices(remote: &MemoryStore, count: usize) {
    remote.seed(
        Collection::Notices,
        (1..=count).map(|n| json!({"title": format!("Notice {n}")})),
    );
}

#[tokio::test]
async fn offline_notice_migrates_once_into_empty_remote() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let cache = Arc::new(LocalCache::open(&path).unwrap());
    // Written by an older client that stored rows without ids
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute(
            "INSERT INTO cache_slots (slot, payload, revision, updated_at) VALUES (?1, ?2, 1, 0)",
            rusqlite::params![
                Collection::Notices.slot(),
                json!([{
                    "title": "Fasting Friday",
                    "periods": [{"start": "2025-10-07", "end": "2025-10-07"}],
                    "created_at": "2025-10-01"
                }])
                .to_string()
            ],
        )
        .unwrap();
    let remote = MemoryStore::new();
    let engine = online(&remote, Arc::clone(&cache));

    let view = engine.load(Collection::Notices).await.unwrap();

    assert_eq!(view.source, Source::Remote);
    assert_eq!(engine.phase(Collection::Notices), LoadPhase::Loaded);
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].id, RecordId::Int(1));
    assert_eq!(titles(&remote.rows(Collection::Notices)), vec!["Fasting Friday"]);

    let cached = cache.read(Collection::Notices);
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, RecordId::Int(1));
    assert_eq!(cached[0].periods().len(), 1);

    engine.load(Collection::Notices).await.unwrap();
    engine.load(Collection::Notices).await.unwrap();
    assert_eq!(remote.insert_attempts().len(), 1);
    assert_eq!(remote.rows(Collection::Notices).len(), 1);
    assert!(cache.local_ids(Collection::Notices).is_empty());
}

#[tokio::test]
async fn cached_rows_matching_remote_rows_are_not_migrated() {
    let cache = cache();
    write_offline(
        &cache,
        Collection::Directory,
        &[
            record(json!({"id": 1_700_000_000_000_i64, "name": " Ana ", "role": "Pastor"})),
            record(json!({"id": 1_700_000_000_001_i64, "name": "Bia", "role": "Tesoureira"})),
        ],
    );
    let remote = MemoryStore::new();
    remote.seed(
        Collection::Directory,
        [json!({"id": 7, "name": "Ana", "role": "Pastor "})],
    );
    let engine = online(&remote, Arc::clone(&cache));

    let view = engine.load(Collection::Directory).await.unwrap();

    let attempts = remote.insert_attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].1.len(), 1);
    assert_eq!(attempts[0].1[0].get("name"), Some(&json!("Bia")));
    let ids = view.records.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids, vec![RecordId::Int(8), RecordId::Int(7)]);
}

#[tokio::test]
async fn duplicates_beyond_the_first_page_are_found_by_scanning() {
    let remote = MemoryStore::new();
    remote.seed(Collection::Notices, [json!({"title": "Old"})]);
    seed_notices(&remote, 14);
    let cache = cache();
    write_offline(
        &cache,
        Collection::Notices,
        &[record(json!({"id": 1_700_000_000_000_i64, "title": " Old"}))],
    );
    let engine = online(&remote, Arc::clone(&cache));

    let view = engine.load(Collection::Notices).await.unwrap();

    assert!(remote.insert_attempts().is_empty());
    assert_eq!(view.records.len(), 10);
    assert!(view.has_more);
    let cached_ids = cache
        .read(Collection::Notices)
        .into_iter()
        .map(|r| r.id)
        .collect::<Vec<_>>();
    assert!(cached_ids.contains(&RecordId::Int(1)));
    assert!(!cached_ids.contains(&RecordId::Int(1_700_000_000_000)));
}

#[tokio::test]
async fn truncated_scan_defers_migration() {
    let remote = MemoryStore::new();
    seed_notices(&remote, 15);
    let cache = cache();
    write_offline(
        &cache,
        Collection::Notices,
        &[record(json!({"id": 1_700_000_000_000_i64, "title": "Offline"}))],
    );
    let config = EngineConfig {
        migration_scan_limit: 3,
        ..EngineConfig::default()
    };
    let engine = Engine::new(Some(remote.clone()), Arc::clone(&cache), config);

    let view = engine.load(Collection::Notices).await.unwrap();

    assert!(remote.insert_attempts().is_empty());
    assert_eq!(view.records.len(), 11);
    assert_eq!(view.records[0].text("title").as_deref(), Some("Offline"));
    assert_eq!(cache.read(Collection::Notices).len(), 11);
}

#[tokio::test]
async fn remote_rows_cached_earlier_are_not_migration_candidates() {
    let remote = MemoryStore::new();
    seed_notices(&remote, 15);
    let cache = cache();
    cache.write(
        Collection::Notices,
        &[record(json!({"id": 2, "title": "Notice 2"}))],
    );
    let config = EngineConfig {
        migration_scan_limit: 3,
        ..EngineConfig::default()
    };
    let engine = Engine::new(Some(remote.clone()), Arc::clone(&cache), config);

    let view = engine.load(Collection::Notices).await.unwrap();

    let expected = (6..=15).rev().map(|n| format!("Notice {n}")).collect::<Vec<_>>();
    assert_eq!(titles(&view.records), expected);
    assert!(view.has_more);
    assert!(remote.insert_attempts().is_empty());
    assert_eq!(remote.calls(FailOn::List), 1);
    let cached = cache.read(Collection::Notices);
    assert_eq!(cached.len(), 11);
    assert_eq!(cached[10].id, RecordId::Int(2));
}

#[tokio::test]
async fn mirrored_rows_deleted_remotely_leave_the_cache() {
    let remote = MemoryStore::new();
    seed_notices(&remote, 3);
    let cache = cache();
    let engine = online(&remote, Arc::clone(&cache));
    engine.load(Collection::Notices).await.unwrap();

    let other_device = online(&remote, Arc::new(LocalCache::open_in_memory().unwrap()));
    other_device.load(Collection::Notices).await.unwrap();
    assert!(other_device.delete(Collection::Notices, &RecordId::Int(2)).settle().await);

    let view = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(titles(&view.records), vec!["Notice 3", "Notice 1"]);
    assert_eq!(titles(&cache.read(Collection::Notices)), vec!["Notice 3", "Notice 1"]);
    assert!(remote.insert_attempts().is_empty());
}

#[tokio::test]
async fn migrate_reports_what_it_pushed() {
    let cache = cache();
    write_offline(
        &cache,
        Collection::Members,
        &[
            record(json!({"id": 1_700_000_000_000_i64, "name": "Ana", "address": "Rua A", "phone": "1"})),
            record(json!({"id": 1_700_000_000_001_i64, "name": "Ana", "address": "Rua B", "phone": "1"})),
        ],
    );
    let remote = MemoryStore::new();
    let engine = online(&remote, Arc::clone(&cache));

    let report = engine.migrate(Collection::Members, &[]).await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.deferred, None);
    assert_eq!(remote.rows(Collection::Members).len(), 1);
    assert_eq!(cache.read(Collection::Members).len(), 1);
}

#[tokio::test]
async fn unreachable_remote_serves_the_cache() {
    let cache = cache();
    let rows = (0..12_i64)
        .rev()
        .map(|n| record(json!({"id": n, "title": format!("Cached {n}")})))
        .collect::<Vec<_>>();
    cache.write(Collection::Notices, &rows);
    let remote = MemoryStore::new();
    remote.fail(FailOn::List, RemoteError::Transport("offline".to_string()));
    let engine = online(&remote, Arc::clone(&cache));

    let view = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(view.source, Source::Local);
    assert!(engine.phase(Collection::Notices).is_degraded());
    assert_eq!(view.records, rows[..10].to_vec());
    assert!(view.has_more);

    let view = engine
        .load_more(Collection::Notices, &SearchQuery::all())
        .await
        .unwrap();
    assert_eq!(view.records, rows);
    assert!(!view.has_more);
    assert_eq!(cache.read(Collection::Notices), rows);
}

#[tokio::test]
async fn local_load_more_keeps_the_search_filter() {
    let cache = cache();
    let rows = (1..=30_i64)
        .rev()
        .map(|n| {
            let title = if n % 2 == 0 {
                format!("Fasting {n}")
            } else {
                format!("Choir {n}")
            };
            let day = if n <= 12 { "2025-10-07" } else { "2025-11-20" };
            record(json!({"id": n, "title": title, "periods": [{"start": day, "end": day}]}))
        })
        .collect::<Vec<_>>();
    cache.write(Collection::Notices, &rows);
    let engine: Engine<MemoryStore> = Engine::new(None, cache, EngineConfig::default());

    let text = SearchQuery::text("fasting");
    let first = engine.search(Collection::Notices, &text).await.unwrap();
    assert_eq!(first.records.len(), 10);
    assert!(first.has_more);
    assert_eq!(first.records[0].text("title").as_deref(), Some("Fasting 30"));

    let more = engine.load_more(Collection::Notices, &text).await.unwrap();
    assert_eq!(more.source, Source::Local);
    assert_eq!(more.page, 2);
    assert!(!more.has_more);
    let expected = (1..=15).rev().map(|n| format!("Fasting {}", n * 2)).collect::<Vec<_>>();
    assert_eq!(titles(&more.records), expected);

    let october = SearchQuery {
        text: Some("choir".to_string()),
        range: Some(DateRange::new(
            parse_date("2025-10-01").unwrap(),
            parse_date("2025-10-31").unwrap(),
        )),
    };
    let first = engine.search(Collection::Notices, &october).await.unwrap();
    assert_eq!(
        titles(&first.records),
        vec!["Choir 11", "Choir 9", "Choir 7", "Choir 5", "Choir 3", "Choir 1"]
    );
    assert!(!first.has_more);

    let more = engine.load_more(Collection::Notices, &october).await.unwrap();
    assert_eq!(more.records, first.records);
    assert!(!more.has_more);
}

#[tokio::test]
async fn local_only_engine_reads_the_cache() {
    let cache = cache();
    cache.write(
        Collection::Events,
        &[record(
            json!({"id": 1, "title": "Culto", "date": "2025-10-12", "time": "18:00", "location": "Templo"}),
        )],
    );
    let engine: Engine<MemoryStore> = Engine::new(None, cache, EngineConfig::default());

    assert!(!engine.capability().is_remote_available());
    let view = engine.load(Collection::Events).await.unwrap();
    assert_eq!(view.source, Source::Local);
    assert_eq!(titles(&view.records), vec!["Culto"]);
}

#[tokio::test(start_paused = true)]
async fn slow_remote_times_out_into_degraded_mode() {
    let cache = cache();
    cache.write(
        Collection::Notices,
        &[record(json!({"id": 1, "title": "Cached"}))],
    );
    let remote = MemoryStore::new();
    seed_notices(&remote, 3);
    remote.delay_next_list(Duration::from_secs(30));
    let engine = online(&remote, cache);

    let view = engine.load(Collection::Notices).await.unwrap();

    assert_eq!(view.source, Source::Local);
    assert_eq!(titles(&view.records), vec!["Cached"]);
}

#[tokio::test]
async fn insert_is_visible_before_the_remote_answers() {
    let cache = cache();
    let remote = MemoryStore::new();
    let engine = online(&remote, Arc::clone(&cache));
    let published = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&published);
    let _subscription = engine
        .notifier()
        .subscribe(Topic::updated(Collection::Notices), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let write = engine
        .insert(Collection::Notices, fields(json!({"title": "Fasting Friday"})))
        .unwrap();

    assert!(write.is_pending());
    let local_id = write.local().id.clone();
    assert_eq!(engine.view(Collection::Notices).records[0].id, local_id);
    assert_eq!(cache.read(Collection::Notices)[0].id, local_id);
    assert_eq!(published.load(Ordering::SeqCst), 1);

    let settled = write.settle().await;

    assert_eq!(settled.id, RecordId::Int(1));
    assert_eq!(cache.read(Collection::Notices)[0].id, RecordId::Int(1));
    assert_eq!(engine.view(Collection::Notices).records[0].id, RecordId::Int(1));
    assert_eq!(published.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn insert_shape_fallback_ends_at_the_minimal_payload() {
    let remote = MemoryStore::new();
    remote.restrict_columns(Collection::Notices, &["title", "created_at"]);
    let engine = online(&remote, cache());

    let write = engine
        .insert(
            Collection::Notices,
            fields(json!({
                "title": "Fasting Friday",
                "periods": [{"start": "2025-10-07", "end": "2025-10-07"}]
            })),
        )
        .unwrap();
    let settled = write.settle().await;

    let attempts = remote.insert_attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts[0].1[0].contains_key("periods"));
    assert!(attempts[1].1[0].contains_key("dates"));
    assert_eq!(Value::Object(attempts[2].1[0].clone()), json!({"title": "Fasting Friday"}));
    assert_eq!(settled.id, RecordId::Int(1));
    assert_eq!(settled.periods().len(), 1);
}

#[tokio::test]
async fn transport_failure_stops_the_shape_ladder_and_keeps_the_row() {
    let cache = cache();
    let remote = MemoryStore::new();
    remote.fail(FailOn::Insert, RemoteError::Transport("reset".to_string()));
    let engine = online(&remote, Arc::clone(&cache));

    let settled = engine
        .insert(Collection::Notices, fields(json!({"title": "Offline"})))
        .unwrap()
        .settle()
        .await;

    assert_eq!(remote.calls(FailOn::Insert), 1);
    assert_eq!(cache.read(Collection::Notices), vec![settled.clone()]);

    remote.recover(FailOn::Insert);
    let view = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].id, RecordId::Int(1));
    assert_eq!(remote.rows(Collection::Notices).len(), 1);
}

#[tokio::test]
async fn delete_during_insert_removes_the_canonical_row() {
    let cache = cache();
    let remote = MemoryStore::new();
    let engine = online(&remote, Arc::clone(&cache));

    let insert = engine
        .insert(Collection::Notices, fields(json!({"title": "Oops"})))
        .unwrap();
    let local_id = insert.local().id.clone();
    let delete = engine.delete(Collection::Notices, &local_id);
    assert!(*delete.local());
    assert!(delete.settle().await);
    let settled = insert.settle().await;

    assert_eq!(settled.id, RecordId::Int(1));
    assert!(remote.rows(Collection::Notices).is_empty());
    assert_eq!(remote.calls(FailOn::Delete), 1);
    assert!(cache.tombstones(Collection::Notices).is_empty());
    assert!(cache.local_ids(Collection::Notices).is_empty());

    let view = engine.load(Collection::Notices).await.unwrap();
    assert!(view.records.is_empty());
    assert!(cache.read(Collection::Notices).is_empty());
}

#[tokio::test]
async fn update_during_insert_reaches_the_canonical_row() {
    let cache = cache();
    let remote = MemoryStore::new();
    let engine = online(&remote, Arc::clone(&cache));

    let insert = engine
        .insert(Collection::Notices, fields(json!({"title": "Draft"})))
        .unwrap();
    let local_id = insert.local().id.clone();
    let update = engine.update(
        Collection::Notices,
        &local_id,
        fields(json!({"title": "Final"})),
    );
    assert_eq!(
        update.local().as_ref().and_then(|r| r.text("title")).as_deref(),
        Some("Final")
    );
    update.settle().await;
    let settled = insert.settle().await;

    assert_eq!(settled.id, RecordId::Int(1));
    assert_eq!(settled.text("title").as_deref(), Some("Final"));
    assert_eq!(titles(&cache.read(Collection::Notices)), vec!["Final"]);
    assert_eq!(titles(&remote.rows(Collection::Notices)), vec!["Final"]);
    assert_eq!(remote.calls(FailOn::Update), 1);

    let view = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(titles(&view.records), vec!["Final"]);
    assert_eq!(remote.insert_attempts().len(), 1);
}

#[tokio::test]
async fn edits_of_unsent_rows_stay_local_until_migration() {
    let cache = cache();
    let remote = MemoryStore::new();
    remote.fail(FailOn::Insert, RemoteError::Transport("reset".to_string()));
    let engine = online(&remote, Arc::clone(&cache));
    let offline = engine
        .insert(Collection::Notices, fields(json!({"title": "Draft"})))
        .unwrap()
        .settle()
        .await;
    let doomed = engine
        .insert(Collection::Notices, fields(json!({"title": "Doomed"})))
        .unwrap()
        .settle()
        .await;

    let update = engine.update(
        Collection::Notices,
        &offline.id,
        fields(json!({"title": "Final"})),
    );
    assert!(!update.is_pending());
    let delete = engine.delete(Collection::Notices, &doomed.id);
    assert!(!delete.is_pending());
    assert_eq!(remote.calls(FailOn::Update), 0);
    assert_eq!(remote.calls(FailOn::Delete), 0);
    assert!(cache.tombstones(Collection::Notices).is_empty());

    remote.recover(FailOn::Insert);
    engine.load(Collection::Notices).await.unwrap();
    assert_eq!(titles(&remote.rows(Collection::Notices)), vec!["Final"]);
}

#[tokio::test]
async fn rejected_delete_stays_deleted_locally() {
    let cache = cache();
    let remote = MemoryStore::new();
    seed_notices(&remote, 3);
    let engine = online(&remote, Arc::clone(&cache));
    engine.load(Collection::Notices).await.unwrap();

    remote.fail(FailOn::Delete, RemoteError::Transport("offline".to_string()));
    let write = engine.delete(Collection::Notices, &RecordId::Int(2));
    assert!(*write.local());
    assert!(write.settle().await);

    assert_eq!(remote.rows(Collection::Notices).len(), 3);
    let view = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(titles(&view.records), vec!["Notice 3", "Notice 1"]);
    assert_eq!(titles(&cache.read(Collection::Notices)), vec!["Notice 3", "Notice 1"]);
}

#[tokio::test]
async fn accepted_delete_clears_its_tombstone() {
    let cache = cache();
    let remote = MemoryStore::new();
    seed_notices(&remote, 2);
    let engine = online(&remote, Arc::clone(&cache));
    engine.load(Collection::Notices).await.unwrap();

    assert!(engine.delete(Collection::Notices, &RecordId::Int(1)).settle().await);

    assert_eq!(titles(&remote.rows(Collection::Notices)), vec!["Notice 2"]);
    assert!(cache.tombstones(Collection::Notices).is_empty());
}

#[tokio::test]
async fn update_adopts_the_canonical_row() {
    let cache = cache();
    let remote = MemoryStore::new();
    remote.seed(
        Collection::Members,
        [json!({"id": 3, "name": "Ana", "address": "Rua A", "phone": "1"})],
    );
    let engine = online(&remote, Arc::clone(&cache));
    engine.load(Collection::Members).await.unwrap();

    let write = engine.update(
        Collection::Members,
        &RecordId::Int(3),
        fields(json!({"phone": "2"})),
    );
    assert_eq!(write.local().as_ref().and_then(|r| r.text("phone")).as_deref(), Some("2"));

    let settled = write.settle().await.unwrap();
    assert_eq!(settled.text("phone").as_deref(), Some("2"));
    assert_eq!(remote.rows(Collection::Members)[0].text("phone").as_deref(), Some("2"));
    assert_eq!(cache.read(Collection::Members), vec![settled]);
}

#[tokio::test(start_paused = true)]
async fn stale_load_is_discarded() {
    let remote = MemoryStore::new();
    seed_notices(&remote, 2);
    let engine = online(&remote, cache());

    remote.delay_next_list(Duration::from_secs(5));
    let slow = tokio::spawn({
        let engine = engine.clone();
        async move { engine.load(Collection::Notices).await }
    });
    tokio::task::yield_now().await;

    remote.seed(Collection::Notices, [json!({"title": "Notice 3"})]);
    let fresh = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(fresh.records.len(), 3);

    let stale = slow.await.unwrap();
    assert!(matches!(stale, Err(Error::Superseded { .. })));
    assert_eq!(engine.view(Collection::Notices).records.len(), 3);
    assert_eq!(engine.phase(Collection::Notices), LoadPhase::Loaded);
}

#[tokio::test]
async fn load_more_pages_through_the_remote() {
    let cache = cache();
    let remote = MemoryStore::new();
    seed_notices(&remote, 25);
    let engine = online(&remote, Arc::clone(&cache));

    let first = engine.load(Collection::Notices).await.unwrap();
    assert_eq!(first.records.len(), 10);
    assert!(first.has_more);

    let all = SearchQuery::all();
    let second = engine.load_more(Collection::Notices, &all).await.unwrap();
    assert_eq!(second.records.len(), 20);
    assert_eq!(second.page, 2);
    assert!(second.has_more);

    let third = engine.load_more(Collection::Notices, &all).await.unwrap();
    assert_eq!(third.records.len(), 25);
    assert!(!third.has_more);
    assert_eq!(third.records[24].id, RecordId::Int(1));
    assert_eq!(cache.read(Collection::Notices).len(), 25);
}

#[tokio::test]
async fn search_falls_back_to_a_single_column() {
    let remote = MemoryStore::new();
    remote.restrict_columns(Collection::Notices, &["title", "periods", "dates"]);
    remote.seed(
        Collection::Notices,
        [
            json!({"title": "Fasting Friday"}),
            json!({"title": "Choir practice"}),
        ],
    );
    let engine = online(&remote, cache());

    let view = engine
        .search(Collection::Notices, &SearchQuery::text("fasting"))
        .await
        .unwrap();

    assert_eq!(titles(&view.records), vec!["Fasting Friday"]);
    assert_eq!(remote.calls(FailOn::List), 2);
}

#[tokio::test]
async fn search_failures_surface_and_restore_the_phase() {
    let remote = MemoryStore::new();
    seed_notices(&remote, 2);
    let engine = online(&remote, cache());
    engine.load(Collection::Notices).await.unwrap();

    remote.fail(
        FailOn::List,
        RemoteError::Api {
            status: 500,
            message: "boom".to_string(),
        },
    );
    let error = engine
        .search(Collection::Notices, &SearchQuery::text("notice"))
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Remote(RemoteError::Api { status: 500, .. })));
    assert_eq!(engine.phase(Collection::Notices), LoadPhase::Loaded);
    assert_eq!(engine.view(Collection::Notices).records.len(), 2);
}

#[tokio::test]
async fn date_range_search_matches_overlapping_periods() {
    let cache = cache();
    cache.write(
        Collection::Notices,
        &[
            record(json!({"id": 3, "title": "October", "periods": [{"start": "2025-10-07", "end": "2025-10-09"}]})),
            record(json!({"id": 2, "title": "Legacy", "dates": ["2025-10-20"]})),
            record(json!({"id": 1, "title": "September", "periods": [{"start": "2025-09-01", "end": "2025-09-30"}]})),
        ],
    );
    let engine: Engine<MemoryStore> = Engine::new(None, cache, EngineConfig::default());
    let query = SearchQuery {
        text: None,
        range: Some(DateRange::new(
            parse_date("2025-10-01").unwrap(),
            parse_date("2025-10-31").unwrap(),
        )),
    };

    let view = engine.search(Collection::Notices, &query).await.unwrap();

    assert_eq!(titles(&view.records), vec!["October", "Legacy"]);
}

#[tokio::test]
async fn empty_search_is_a_plain_load() {
    let remote = MemoryStore::new();
    seed_notices(&remote, 2);
    let engine = online(&remote, cache());

    let view = engine
        .search(Collection::Notices, &SearchQuery::text("   "))
        .await
        .unwrap();

    assert_eq!(view.records.len(), 2);
    assert_eq!(engine.phase(Collection::Notices), LoadPhase::Loaded);
}
