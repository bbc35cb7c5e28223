use std::path::{Path, PathBuf};
use std::sync::Arc;

use mural_core::remote::SupabaseStore;
use mural_core::{Capability, Collection, Engine, LocalCache, PageView, Record, RecordId, Source};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config_profiles::{default_cache_path, CliProfilesConfig};
use crate::error::CliError;

/// Engine wired to the active profile's remote store and the local cache.
pub struct AppContext {
    pub engine: Engine<SupabaseStore>,
    pub profile: String,
    pub cache_path: PathBuf,
}

impl AppContext {
    pub fn open(cache_path: Option<&Path>, profile: Option<&str>) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();

        let remote_config = profile.remote_config()?;
        let engine_config = profile.engine_config();
        let remote = match Capability::detect(&remote_config) {
            Capability::RemoteAvailable => {
                match SupabaseStore::from_config(&remote_config, engine_config.remote_timeout()) {
                    Ok(store) => Some(store),
                    Err(error) => {
                        tracing::warn!("Remote store unusable, running local-only: {}", error);
                        None
                    }
                }
            }
            Capability::LocalOnly => None,
        };

        let cache_path = cache_path.map_or_else(default_cache_path, Path::to_path_buf);
        let cache = Arc::new(LocalCache::open_or_memory(&cache_path)?);

        Ok(Self {
            engine: Engine::new(remote, cache, engine_config),
            profile: profile_name,
            cache_path,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PageOutput<'a> {
    pub collection: Collection,
    pub source: Source,
    pub has_more: bool,
    pub records: &'a [Record],
}

pub fn print_page(collection: Collection, view: &PageView, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let output = PageOutput {
            collection,
            source: view.source,
            has_more: view.has_more,
            records: &view.records,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for line in format_record_lines(collection, &view.records) {
        println!("{line}");
    }
    if view.source == Source::Local {
        eprintln!("(served from the local cache)");
    }
    if view.has_more {
        eprintln!("(more available)");
    }
    Ok(())
}

pub fn format_record_lines(collection: Collection, records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let label = record_label(collection, record);
            let detail = record_detail(collection, record);
            if detail.is_empty() {
                format!("{id:<14}  {label}")
            } else {
                format!("{id:<14}  {label:<40}  {detail}")
            }
        })
        .collect()
}

fn record_label(collection: Collection, record: &Record) -> String {
    let field = match collection {
        Collection::Members | Collection::Directory => "name",
        Collection::Notices | Collection::Events | Collection::Content => "title",
    };
    truncate(&record.trimmed(field).unwrap_or_default(), 40)
}

fn record_detail(collection: Collection, record: &Record) -> String {
    match collection {
        Collection::Notices => record
            .periods()
            .iter()
            .map(|period| {
                if period.start == period.end {
                    period.start.to_string()
                } else {
                    format!("{}..{}", period.start, period.end)
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Collection::Members => join_present(record, &["phone", "address"]),
        Collection::Directory => join_present(record, &["role"]),
        Collection::Events => join_present(record, &["date", "time", "location"]),
        Collection::Content => join_present(record, &["type", "date"]),
    }
}

fn join_present(record: &Record, fields: &[&str]) -> String {
    fields
        .iter()
        .filter_map(|field| record.trimmed(field))
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn normalize_record_id(id: &str) -> Result<RecordId, CliError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CliError::EmptyRecordId);
    }
    match id.parse::<RecordId>() {
        Ok(id) => Ok(id),
        Err(never) => match never {},
    }
}

/// Build a patch from `KEY=VALUE` text assignments and `KEY=JSON` assignments.
pub fn parse_assignments(text: &[String], json: &[String]) -> Result<Map<String, Value>, CliError> {
    let mut patch = Map::new();
    for assignment in text {
        let (key, value) = split_assignment(assignment)?;
        patch.insert(key, Value::String(value.to_string()));
    }
    for assignment in json {
        let (key, value) = split_assignment(assignment)?;
        patch.insert(key, serde_json::from_str(value)?);
    }
    if patch.is_empty() {
        return Err(CliError::EmptyPatch);
    }
    Ok(patch)
}

fn split_assignment(assignment: &str) -> Result<(String, &str), CliError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| CliError::InvalidAssignment(assignment.to_string()))?;
    let key = key.trim();
    if key.is_empty() || key == "id" {
        return Err(CliError::InvalidAssignment(assignment.to_string()));
    }
    Ok((key.to_string(), value))
}
