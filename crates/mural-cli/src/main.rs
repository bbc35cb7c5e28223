//! Mural CLI - read and edit the church mural from the terminal
//!
//! Works offline against the local cache and reconciles with Supabase
//! whenever a profile configures it.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::AppContext;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::search::run_search;
use crate::commands::status::run_status;
use crate::commands::summary::run_summary;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "mural=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Config { command } = cli.command {
        return run_config(command, cli.profile.as_deref());
    }

    let context = AppContext::open(cli.cache_path.as_deref(), cli.profile.as_deref())?;

    match cli.command {
        Commands::List {
            collection,
            pages,
            json,
        } => run_list(&context, collection, pages, json).await?,
        Commands::Search {
            collection,
            text,
            from,
            to,
            json,
        } => run_search(&context, collection, text, from, to, json).await?,
        Commands::Add { record } => run_add(&context, record).await?,
        Commands::Edit {
            collection,
            id,
            set,
            set_json,
        } => run_edit(&context, collection, &id, &set, &set_json).await?,
        Commands::Delete { collection, id } => run_delete(&context, collection, &id).await?,
        Commands::Summary { json } => run_summary(&context, json).await?,
        Commands::Status { json } => run_status(&context, json)?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
