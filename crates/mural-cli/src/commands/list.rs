use mural_core::{Collection, SearchQuery};

use crate::commands::common::{print_page, AppContext};
use crate::error::CliError;

pub async fn run_list(
    context: &AppContext,
    collection: Collection,
    pages: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let mut view = context.engine.load(collection).await?;
    let everything = SearchQuery::all();
    for _ in 1..pages {
        if !view.has_more {
            break;
        }
        view = context.engine.load_more(collection, &everything).await?;
    }

    print_page(collection, &view, as_json)
}
