//! Dashboard aggregations over cached collections.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::engine::Engine;
use crate::models::{Collection, Record, RecordId};
use crate::notify::{Subscription, Topic};
use crate::remote::RemoteStore;
use crate::task::BackgroundTask;
use crate::util::parse_date;

pub const UPCOMING_EVENTS_LIMIT: usize = 5;
pub const UPCOMING_BIRTHDAYS_LIMIT: usize = 5;
pub const RECENT_NOTICES_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEvent {
    pub id: RecordId,
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingBirthday {
    pub id: RecordId,
    pub name: String,
    pub birthdate: NaiveDate,
    /// Next anniversary on or after today.
    pub next: NaiveDate,
    pub days_until: i64,
}

/// Events dated today or later, soonest first.
///
/// Rows without a title or a parseable date are skipped.
pub fn upcoming_events(records: &[Record], today: NaiveDate, limit: usize) -> Vec<UpcomingEvent> {
    let mut upcoming = records
        .iter()
        .filter_map(|record| {
            let title = record.trimmed("title")?;
            let date = record.text("date").as_deref().and_then(parse_date)?;
            Some(UpcomingEvent {
                id: record.id.clone(),
                title,
                date,
                time: record.trimmed("time"),
                location: record.trimmed("location"),
            })
        })
        .filter(|event| event.date >= today)
        .collect::<Vec<_>>();
    upcoming.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
    upcoming.truncate(limit);
    upcoming
}

/// Members ordered by their next birthday.
pub fn upcoming_birthdays(
    records: &[Record],
    today: NaiveDate,
    limit: usize,
) -> Vec<UpcomingBirthday> {
    let mut upcoming = records
        .iter()
        .filter_map(|record| {
            let name = record.trimmed("name")?;
            let birthdate = record.text("birthdate").as_deref().and_then(parse_date)?;
            let next = next_anniversary(birthdate, today)?;
            Some(UpcomingBirthday {
                id: record.id.clone(),
                name,
                birthdate,
                next,
                days_until: (next - today).num_days(),
            })
        })
        .collect::<Vec<_>>();
    upcoming.sort_by(|a, b| a.next.cmp(&b.next).then_with(|| a.name.cmp(&b.name)));
    upcoming.truncate(limit);
    upcoming
}

/// The first `limit` notices in collection order (newest first).
pub fn recent_notices(records: &[Record], limit: usize) -> Vec<Record> {
    records.iter().take(limit).cloned().collect()
}

/// Anniversary of `birthdate` in `year`. February 29 falls on March 1 in
/// common years.
fn anniversary_in(birthdate: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birthdate.month(), birthdate.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

fn next_anniversary(birthdate: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = anniversary_in(birthdate, today.year())?;
    if this_year >= today {
        Some(this_year)
    } else {
        anniversary_in(birthdate, today.year() + 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardData {
    pub upcoming_events: Vec<UpcomingEvent>,
    pub upcoming_birthdays: Vec<UpcomingBirthday>,
    pub recent_notices: Vec<Record>,
}

impl DashboardData {
    pub fn compute<R: RemoteStore>(engine: &Engine<R>, today: NaiveDate) -> Self {
        Self {
            upcoming_events: upcoming_events(
                &engine.snapshot(Collection::Events),
                today,
                UPCOMING_EVENTS_LIMIT,
            ),
            upcoming_birthdays: upcoming_birthdays(
                &engine.snapshot(Collection::Members),
                today,
                UPCOMING_BIRTHDAYS_LIMIT,
            ),
            recent_notices: recent_notices(
                &engine.snapshot(Collection::Notices),
                RECENT_NOTICES_LIMIT,
            ),
        }
    }
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Live dashboard. Recomputes whenever a collection it shows is updated.
pub struct Dashboard {
    data: Arc<Mutex<DashboardData>>,
    _subscriptions: Vec<Subscription>,
}

impl Dashboard {
    pub fn new<R: RemoteStore>(engine: &Engine<R>) -> Self {
        Self::with_clock(engine, || chrono::Local::now().date_naive())
    }

    pub fn with_clock<R: RemoteStore>(
        engine: &Engine<R>,
        today: impl Fn() -> NaiveDate + Send + Sync + 'static,
    ) -> Self {
        let today: Clock = Arc::new(today);
        let data = Arc::new(Mutex::new(DashboardData::compute(engine, today())));

        let notifier = engine.notifier();
        let subscriptions = [Collection::Members, Collection::Events, Collection::Notices]
            .into_iter()
            .map(|collection| {
                let engine = engine.clone();
                let data = Arc::clone(&data);
                let today = Arc::clone(&today);
                notifier.subscribe(Topic::updated(collection), move |topic| {
                    tracing::debug!("Dashboard refreshing after {}", topic);
                    let fresh = DashboardData::compute(&engine, today());
                    *data.lock().unwrap_or_else(PoisonError::into_inner) = fresh;
                })
            })
            .collect();

        Self {
            data,
            _subscriptions: subscriptions,
        }
    }

    pub fn current(&self) -> DashboardData {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Periodically reloads one collection. Scheduling again replaces the
/// running schedule.
#[derive(Default)]
pub struct RefreshScheduler {
    task: Mutex<Option<BackgroundTask>>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called within a tokio runtime.
    pub fn schedule<R: RemoteStore>(
        &self,
        engine: Engine<R>,
        collection: Collection,
        interval: Duration,
    ) {
        let task = BackgroundTask::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match engine.load(collection).await {
                    Ok(view) => {
                        tracing::debug!("Refreshed {} ({} records)", collection, view.len());
                    }
                    Err(error) if error.is_superseded() => {}
                    Err(error) => tracing::warn!("Refreshing {} failed: {}", collection, error),
                }
            }
        });

        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        drop(previous);
    }

    pub fn stop(&self) {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::LocalCache;
    use crate::remote::{FailOn, MemoryStore};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn day(value: &str) -> NaiveDate {
        parse_date(value).unwrap()
    }

    #[test]
    fn upcoming_events_skip_past_and_undated_rows() {
        let events = vec![
            record(json!({"id": 1, "title": "Past", "date": "2025-10-01"})),
            record(json!({"id": 2, "title": "Evening", "date": "2025-10-07", "time": "19:00"})),
            record(json!({"id": 3, "title": "Morning", "date": "2025-10-07", "time": "09:00"})),
            record(json!({"id": 4, "title": "Undated", "date": "soon"})),
            record(json!({"id": 5, "date": "2025-10-08"})),
            record(json!({"id": 6, "title": "Later", "date": "2025-11-01"})),
        ];
        let titles = upcoming_events(&events, day("2025-10-07"), 5)
            .into_iter()
            .map(|event| event.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Morning", "Evening", "Later"]);
    }

    #[test]
    fn upcoming_events_respect_limit() {
        let events = (1..=8)
            .map(|n| record(json!({"id": n, "title": format!("E{n}"), "date": format!("2025-12-0{n}")})))
            .collect::<Vec<_>>();
        assert_eq!(upcoming_events(&events, day("2025-10-07"), 5).len(), 5);
    }

    #[test]
    fn birthdays_wrap_into_next_year() {
        let members = vec![
            record(json!({"id": 1, "name": "Ana", "birthdate": "1990-01-15"})),
            record(json!({"id": 2, "name": "Bia", "birthdate": "1985-10-07"})),
            record(json!({"id": 3, "name": "Caio", "birthdate": "2001-12-24"})),
            record(json!({"id": 4, "name": "Dora"})),
        ];
        let upcoming = upcoming_birthdays(&members, day("2025-10-07"), 5);
        let summary = upcoming
            .iter()
            .map(|b| (b.name.as_str(), b.days_until))
            .collect::<Vec<_>>();
        assert_eq!(summary, vec![("Bia", 0), ("Caio", 78), ("Ana", 100)]);
        assert_eq!(upcoming[2].next, day("2026-01-15"));
    }

    #[test]
    fn leap_day_birthdays_fall_on_march_first() {
        let members = vec![record(json!({"id": 1, "name": "Leo", "birthdate": "2000-02-29"}))];
        let upcoming = upcoming_birthdays(&members, day("2025-02-10"), 5);
        assert_eq!(upcoming[0].next, day("2025-03-01"));

        let upcoming = upcoming_birthdays(&members, day("2028-02-10"), 5);
        assert_eq!(upcoming[0].next, day("2028-02-29"));
    }

    #[test]
    fn recent_notices_keep_collection_order() {
        let notices = (0..12)
            .rev()
            .map(|n| record(json!({"id": n, "title": format!("N{n}")})))
            .collect::<Vec<_>>();
        let recent = recent_notices(&notices, 10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].id, RecordId::Int(11));
    }

    #[tokio::test]
    async fn dashboard_refreshes_on_updates() {
        let engine: Engine<MemoryStore> = Engine::new(
            None,
            Arc::new(LocalCache::open_in_memory().unwrap()),
            EngineConfig::default(),
        );
        let dashboard = Dashboard::with_clock(&engine, || day("2025-10-07"));
        assert_eq!(dashboard.current(), DashboardData::default());

        engine
            .insert(
                Collection::Events,
                json!({"title": "Culto", "date": "2025-10-12", "time": "18:00", "location": "Templo"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();

        let current = dashboard.current();
        assert_eq!(current.upcoming_events.len(), 1);
        assert_eq!(current.upcoming_events[0].title, "Culto");
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_running_refresh() {
        let remote = MemoryStore::new();
        let engine = Engine::new(
            Some(remote.clone()),
            Arc::new(LocalCache::open_in_memory().unwrap()),
            EngineConfig::default(),
        );
        let scheduler = RefreshScheduler::new();
        scheduler.schedule(engine.clone(), Collection::Notices, Duration::from_secs(15));
        scheduler.schedule(engine, Collection::Notices, Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(remote.calls(FailOn::List), 2);

        scheduler.stop();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.calls(FailOn::List), 2);
    }
}
