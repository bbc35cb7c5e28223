use mural_core::models::{ContentItem, DirectoryEntry, Event, Member, Notice, Payload, Period};
use mural_core::util::normalize_text_option;

use crate::cli::AddCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_add(context: &AppContext, record: AddCommands) -> Result<(), CliError> {
    match record {
        AddCommands::Notice { title, start, end } => {
            let end = end.unwrap_or_else(|| start.clone());
            let period = Period::parse(&start, &end)?;
            insert(context, Notice::new(title, period)).await
        }
        AddCommands::Member {
            name,
            address,
            phone,
            birthdate,
            photo,
        } => {
            let member = Member {
                name,
                address,
                phone,
                birthdate,
                photo: normalize_text_option(photo),
            };
            insert(context, member).await
        }
        AddCommands::Directory { name, role, photo } => {
            let entry = DirectoryEntry {
                name,
                role,
                photo: normalize_text_option(photo),
            };
            insert(context, entry).await
        }
        AddCommands::Event {
            title,
            date,
            time,
            location,
        } => {
            let event = Event {
                title,
                date,
                time,
                location,
            };
            insert(context, event).await
        }
        AddCommands::Content { kind, title, date } => {
            insert(context, ContentItem { kind, title, date }).await
        }
    }
}

async fn insert<P: Payload>(context: &AppContext, payload: P) -> Result<(), CliError> {
    let write = context.engine.insert_payload(payload)?;
    let local_id = write.local().id.clone();
    let settled = write.settle().await;

    if settled.id == local_id && context.engine.capability().is_remote_available() {
        eprintln!("(saved locally; it will be pushed on the next list)");
    }
    println!("{}", settled.id);
    Ok(())
}
