use chrono::NaiveDate;
use mural_core::{Collection, SearchQuery};

use crate::commands::common::{print_page, AppContext};
use crate::error::CliError;

pub async fn run_search(
    context: &AppContext,
    collection: Collection,
    text: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    as_json: bool,
) -> Result<(), CliError> {
    let query = normalize_search_query(text, from, to)?;
    let view = context.engine.search(collection, &query).await?;
    print_page(collection, &view, as_json)
}

pub fn normalize_search_query(
    text: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<SearchQuery, CliError> {
    let query = SearchQuery::new(text, from, to);
    if query.is_empty() {
        return Err(CliError::EmptySearchQuery);
    }
    Ok(query)
}
