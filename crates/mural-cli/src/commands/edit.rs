use mural_core::Collection;

use crate::commands::common::{normalize_record_id, parse_assignments, AppContext};
use crate::error::CliError;

pub async fn run_edit(
    context: &AppContext,
    collection: Collection,
    id: &str,
    set: &[String],
    set_json: &[String],
) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let patch = parse_assignments(set, set_json)?;

    let Some(updated) = context.engine.update(collection, &id, patch).settle().await else {
        return Err(CliError::RecordNotFound {
            collection,
            id: id.to_string(),
        });
    };

    println!("{}", updated.id);
    Ok(())
}
