use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mural_core::Collection;

#[derive(Parser)]
#[command(name = "mural")]
#[command(about = "Read and edit the church mural from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local cache database
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    /// CLI profile holding the remote store configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a collection, reconciling with the remote store when configured
    #[command(alias = "ls")]
    List {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        /// How many pages to show
        #[arg(long, default_value = "1")]
        pages: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search a collection by text and/or date range
    Search {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        /// Text matched against the collection's searchable fields
        text: Option<String>,
        /// Range start (YYYY-MM-DD); needs --to
        #[arg(long, value_name = "DATE")]
        from: Option<NaiveDate>,
        /// Range end (YYYY-MM-DD); needs --from
        #[arg(long, value_name = "DATE")]
        to: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a record
    #[command(alias = "new")]
    Add {
        #[command(subcommand)]
        record: AddCommands,
    },
    /// Change fields of a record
    Edit {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        id: String,
        /// Text field assignment, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// JSON field assignment, repeatable
        #[arg(long = "set-json", value_name = "KEY=JSON")]
        set_json: Vec<String>,
    },
    /// Delete a record
    #[command(alias = "rm")]
    Delete {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        id: String,
    },
    /// Upcoming events, birthdays and recent notices
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show remote capability and local cache state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum AddCommands {
    /// Notice valid from --start to --end
    Notice {
        #[arg(long)]
        title: String,
        #[arg(long, value_name = "DATE")]
        start: String,
        /// Defaults to the start date
        #[arg(long, value_name = "DATE")]
        end: Option<String>,
    },
    Member {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        phone: String,
        #[arg(long, value_name = "DATE")]
        birthdate: Option<NaiveDate>,
        /// Photo URL
        #[arg(long, value_name = "URL")]
        photo: Option<String>,
    },
    /// Directory entry (board member)
    Directory {
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long, value_name = "URL")]
        photo: Option<String>,
    },
    Event {
        #[arg(long)]
        title: String,
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
        /// HH:MM
        #[arg(long)]
        time: String,
        #[arg(long)]
        location: String,
    },
    Content {
        /// Content type (e.g. sermon, study)
        #[arg(long = "type", value_name = "TYPE")]
        kind: String,
        #[arg(long)]
        title: String,
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

fn parse_collection(value: &str) -> Result<Collection, String> {
    value.parse::<Collection>().map_err(|error| error.to_string())
}
