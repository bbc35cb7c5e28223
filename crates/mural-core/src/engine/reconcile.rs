//! Merging a remote listing into the local mirror.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::dedup::DedupKeyResolver;
use crate::models::{CollectionSpec, Record, RecordId};

/// Everything known about the remote side after a load.
pub(super) struct RemoteSide<'a> {
    /// First page, already stripped of locally deleted ids.
    pub page: &'a [Record],
    /// Whether the first page was the whole remote listing.
    pub complete: bool,
    /// Rows scanned beyond the first page while looking for dedup matches.
    pub beyond: &'a [Record],
    /// Local id of each migrated record mapped to its canonical row.
    pub migrated: &'a HashMap<RecordId, Record>,
}

/// Cached rows the listing cannot vouch for.
pub(super) struct Pending<'a> {
    /// Ids whose remote insert is still running.
    pub in_flight: &'a HashSet<RecordId>,
    /// Ids created on this device and not yet accepted remotely.
    pub local: &'a HashSet<RecordId>,
    /// Canonical ids accepted by a settled insert that no listing has
    /// shown yet.
    pub accepted: &'a HashSet<RecordId>,
}

pub(super) struct Merged {
    /// New contents of the cache slot.
    pub cache: Vec<Record>,
    /// What the first page of the live view shows.
    pub view: Vec<Record>,
}

/// Fold `current` (the cache as it is right now) into the remote side.
///
/// Migrated and still-pending local rows lead, then the remote page, then
/// remote rows known from the scan. A local row whose dedup key is already
/// claimed by a remote or migrated row is dropped: it is the same entity.
/// Rows whose remote insert is still in flight are always kept as pending.
///
/// Any other cached row mirrors a remote row from an earlier listing. When
/// it sorts inside the range the first page covers and the page lacks it,
/// it was deleted remotely and is dropped. Rows sorting past the page stay
/// cached behind it.
pub(super) fn merge(
    spec: &CollectionSpec,
    resolver: DedupKeyResolver,
    current: Vec<Record>,
    remote: &RemoteSide<'_>,
    pending: &Pending<'_>,
) -> Merged {
    let page_ids = remote
        .page
        .iter()
        .map(|record| record.id.clone())
        .collect::<HashSet<_>>();
    let claimed = remote
        .page
        .iter()
        .chain(remote.migrated.values())
        .map(|record| resolver.key(record))
        .collect::<HashSet<_>>();
    let beyond_by_id = remote
        .beyond
        .iter()
        .map(|record| (record.id.clone(), record))
        .collect::<HashMap<_, _>>();
    let mut beyond_by_key = HashMap::new();
    for record in remote.beyond {
        beyond_by_key
            .entry(resolver.key(record))
            .or_insert_with(|| record.clone());
    }

    let mut front = Vec::new();
    let mut tail = Vec::<Record>::new();
    let mut seen = page_ids.clone();

    for record in current {
        if let Some(canonical) = remote.migrated.get(&record.id) {
            if seen.insert(canonical.id.clone()) {
                front.push(canonical.clone());
            }
            continue;
        }
        if page_ids.contains(&record.id) {
            continue;
        }
        if pending.in_flight.contains(&record.id) || pending.accepted.contains(&record.id) {
            seen.insert(record.id.clone());
            front.push(record);
            continue;
        }
        if let Some(known) = beyond_by_id.get(&record.id) {
            if seen.insert(record.id.clone()) {
                tail.push((*known).clone());
            }
            continue;
        }

        if !pending.local.contains(&record.id) {
            if !covered_by_page(spec, remote, &record) && seen.insert(record.id.clone()) {
                spec.order.insert_sorted(&mut tail, record);
            }
            continue;
        }

        let key = resolver.key(&record);
        if claimed.contains(&key) {
            continue;
        }
        match beyond_by_key.get(&key) {
            Some(known) => {
                if seen.insert(known.id.clone()) {
                    tail.push(known.clone());
                }
            }
            None => {
                if seen.insert(record.id.clone()) {
                    front.push(record);
                }
            }
        }
    }

    let mut view = front.clone();
    view.extend(remote.page.iter().cloned());
    spec.order.sort(&mut view);

    let mut cache = view.clone();
    cache.extend(tail);
    spec.order.sort(&mut cache);

    Merged { cache, view }
}

/// Whether the first page would have listed `record` had it still existed.
fn covered_by_page(spec: &CollectionSpec, remote: &RemoteSide<'_>, record: &Record) -> bool {
    if remote.complete {
        return true;
    }
    match remote.page.last() {
        Some(last) => spec.order.compare(record, last) == Ordering::Less,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    /// Ids from the millisecond clock were made on this device.
    fn local_ids(records: &[Record]) -> HashSet<RecordId> {
        records
            .iter()
            .filter(|record| matches!(record.id, RecordId::Int(id) if id >= 1_000_000_000_000))
            .map(|record| record.id.clone())
            .collect()
    }

    fn merge_notices(
        current: Vec<Record>,
        page: &[Record],
        beyond: &[Record],
        migrated: &HashMap<RecordId, Record>,
    ) -> Merged {
        let local = local_ids(&current);
        merge(
            Collection::Notices.spec(),
            DedupKeyResolver::for_collection(Collection::Notices),
            current,
            &RemoteSide {
                page,
                complete: false,
                beyond,
                migrated,
            },
            &Pending {
                in_flight: &HashSet::new(),
                local: &local,
                accepted: &HashSet::new(),
            },
        )
    }

    #[test]
    fn pending_rows_lead_and_duplicates_drop() {
        let page = vec![record(json!({"id": 2, "title": "Remote"}))];
        let current = vec![
            record(json!({"id": 1_700_000_000_000_i64, "title": "Offline"})),
            record(json!({"id": 1_600_000_000_000_i64, "title": "Remote"})),
        ];
        let merged = merge_notices(current, &page, &[], &HashMap::new());
        assert_eq!(ids(&merged.view), vec!["1700000000000", "2"]);
        assert_eq!(ids(&merged.cache), vec!["1700000000000", "2"]);
    }

    #[test]
    fn migrated_rows_replace_local_originals() {
        let page = vec![record(json!({"id": 2, "title": "Remote"}))];
        let local = record(json!({"id": 1_700_000_000_000_i64, "title": "Offline"}));
        let canonical = record(json!({"id": 3, "title": "Offline"}));
        let migrated = HashMap::from([(local.id.clone(), canonical)]);
        let merged = merge_notices(vec![local], &page, &[], &migrated);
        assert_eq!(ids(&merged.cache), vec!["3", "2"]);
    }

    #[test]
    fn rows_known_beyond_the_page_stay_cached_but_hidden() {
        let page = vec![record(json!({"id": 12, "title": "Newest"}))];
        let beyond = vec![record(json!({"id": 4, "title": "Old"}))];
        let current = vec![
            record(json!({"id": 4, "title": "Old"})),
            record(json!({"id": 1_700_000_000_000_i64, "title": "Old"})),
        ];
        let merged = merge_notices(current, &page, &beyond, &HashMap::new());
        assert_eq!(ids(&merged.view), vec!["12"]);
        assert_eq!(ids(&merged.cache), vec!["12", "4"]);
    }

    #[test]
    fn rows_edited_remotely_match_by_id() {
        let page = vec![record(json!({"id": 12, "title": "Newest"}))];
        let beyond = vec![record(json!({"id": 4, "title": "Renamed"}))];
        let current = vec![record(json!({"id": 4, "title": "Old"}))];
        let merged = merge_notices(current, &page, &beyond, &HashMap::new());
        assert_eq!(ids(&merged.cache), vec!["12", "4"]);
        assert_eq!(merged.cache[1].text("title").as_deref(), Some("Renamed"));
    }

    #[test]
    fn mirrored_rows_past_the_page_stay_behind_it() {
        let page = (6..=15)
            .rev()
            .map(|n| record(json!({"id": n, "title": format!("Notice {n}")})))
            .collect::<Vec<_>>();
        let current = vec![
            record(json!({"id": 2, "title": "Notice 2"})),
            record(json!({"id": 4, "title": "Notice 4"})),
        ];
        let merged = merge_notices(current, &page, &[], &HashMap::new());
        assert_eq!(merged.view, page);
        assert_eq!(ids(&merged.cache[10..]), vec!["4", "2"]);
    }

    #[test]
    fn mirrored_rows_missing_from_their_range_were_deleted_remotely() {
        let page = vec![
            record(json!({"id": 9, "title": "Nine"})),
            record(json!({"id": 5, "title": "Five"})),
        ];
        let current = vec![
            record(json!({"id": 7, "title": "Seven"})),
            record(json!({"id": 3, "title": "Three"})),
        ];
        let merged = merge_notices(current, &page, &[], &HashMap::new());
        assert_eq!(ids(&merged.view), vec!["9", "5"]);
        assert_eq!(ids(&merged.cache), vec!["9", "5", "3"]);

        let current = vec![record(json!({"id": 3, "title": "Three"}))];
        let merged = merge(
            Collection::Notices.spec(),
            DedupKeyResolver::for_collection(Collection::Notices),
            current,
            &RemoteSide {
                page: &page,
                complete: true,
                beyond: &[],
                migrated: &HashMap::new(),
            },
            &Pending {
                in_flight: &HashSet::new(),
                local: &HashSet::new(),
                accepted: &HashSet::new(),
            },
        );
        assert_eq!(ids(&merged.cache), vec!["9", "5"]);
    }

    #[test]
    fn accepted_rows_survive_an_older_listing() {
        let page = vec![record(json!({"id": 2, "title": "Remote"}))];
        let accepted_row = record(json!({"id": 3, "title": "Just accepted"}));
        let accepted = HashSet::from([accepted_row.id.clone()]);
        let merged = merge(
            Collection::Notices.spec(),
            DedupKeyResolver::for_collection(Collection::Notices),
            vec![accepted_row],
            &RemoteSide {
                page: &page,
                complete: true,
                beyond: &[],
                migrated: &HashMap::new(),
            },
            &Pending {
                in_flight: &HashSet::new(),
                local: &HashSet::new(),
                accepted: &accepted,
            },
        );
        assert_eq!(ids(&merged.view), vec!["3", "2"]);
    }

    #[test]
    fn in_flight_rows_survive_key_collisions() {
        let page = vec![record(json!({"id": 2, "title": "Same"}))];
        let optimistic = record(json!({"id": 1_700_000_000_000_i64, "title": "Same"}));
        let in_flight = HashSet::from([optimistic.id.clone()]);
        let merged = merge(
            Collection::Notices.spec(),
            DedupKeyResolver::for_collection(Collection::Notices),
            vec![optimistic],
            &RemoteSide {
                page: &page,
                complete: true,
                beyond: &[],
                migrated: &HashMap::new(),
            },
            &Pending {
                in_flight: &in_flight,
                local: &in_flight,
                accepted: &HashSet::new(),
            },
        );
        assert_eq!(ids(&merged.view), vec!["1700000000000", "2"]);
    }

    #[test]
    fn date_ordered_collections_are_resorted() {
        let page = vec![
            record(json!({"id": 1, "title": "A", "date": "2025-10-01", "time": "09:00"})),
            record(json!({"id": 2, "title": "C", "date": "2025-10-09", "time": "09:00"})),
        ];
        let current = vec![record(
            json!({"id": 1_700_000_000_000_i64, "title": "B", "date": "2025-10-05", "time": "09:00"}),
        )];
        let local = local_ids(&current);
        let merged = merge(
            Collection::Events.spec(),
            DedupKeyResolver::for_collection(Collection::Events),
            current,
            &RemoteSide {
                page: &page,
                complete: true,
                beyond: &[],
                migrated: &HashMap::new(),
            },
            &Pending {
                in_flight: &HashSet::new(),
                local: &local,
                accepted: &HashSet::new(),
            },
        );
        assert_eq!(ids(&merged.view), vec!["1", "1700000000000", "2"]);
    }
}
