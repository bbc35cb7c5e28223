use mural_core::Collection;

use crate::commands::common::{normalize_record_id, AppContext};
use crate::error::CliError;

pub async fn run_delete(context: &AppContext, collection: Collection, id: &str) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let removed = context.engine.delete(collection, &id).settle().await;

    // Without a remote store there is nothing else the id could refer to
    if !removed && !context.engine.capability().is_remote_available() {
        return Err(CliError::RecordNotFound {
            collection,
            id: id.to_string(),
        });
    }

    println!("{id}");
    Ok(())
}
