use mural_core::Collection;
use serde::Serialize;

use crate::commands::common::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub profile: String,
    pub capability: &'static str,
    pub cache_path: String,
    pub collections: Vec<SlotStatus>,
}

#[derive(Debug, Serialize)]
pub struct SlotStatus {
    pub collection: Collection,
    pub slot: &'static str,
    pub records: usize,
    pub revision: u64,
    /// Records created here that the remote store has not accepted yet.
    pub unsent: usize,
    pub pending_deletes: usize,
}

pub fn collect_status(context: &AppContext) -> StatusOutput {
    let cache = context.engine.cache();
    let cache_path = cache.path().map_or_else(
        || format!("{} (unavailable, in memory)", context.cache_path.display()),
        |path| path.display().to_string(),
    );

    StatusOutput {
        profile: context.profile.clone(),
        capability: context.engine.capability().label(),
        cache_path,
        collections: Collection::ALL
            .into_iter()
            .map(|collection| SlotStatus {
                collection,
                slot: collection.slot(),
                records: cache.read(collection).len(),
                revision: cache.revision(collection),
                unsent: cache.local_ids(collection).len(),
                pending_deletes: cache.tombstones(collection).len(),
            })
            .collect(),
    }
}

pub fn run_status(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let status = collect_status(context);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Profile:    {}", status.profile);
    println!("Mode:       {}", status.capability);
    println!("Cache:      {}", status.cache_path);
    for slot in &status.collections {
        let mut notes = Vec::new();
        if slot.unsent > 0 {
            notes.push(format!("{} not yet sent", slot.unsent));
        }
        if slot.pending_deletes > 0 {
            notes.push(format!(
                "{} deletes not confirmed remotely",
                slot.pending_deletes
            ));
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!("  ({})", notes.join(", "))
        };
        println!(
            "{:<16} {:>5} records  rev {}{notes}",
            slot.slot, slot.records, slot.revision
        );
    }
    Ok(())
}
