use mural_core::summary::DashboardData;
use mural_core::Collection;

use crate::commands::common::{format_record_lines, AppContext};
use crate::error::CliError;

pub async fn run_summary(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    for collection in [Collection::Events, Collection::Members, Collection::Notices] {
        context.engine.load(collection).await?;
    }
    let today = chrono::Local::now().date_naive();
    let data = DashboardData::compute(&context.engine, today);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    for line in format_summary_lines(&data) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_summary_lines(data: &DashboardData) -> Vec<String> {
    let mut lines = vec!["Upcoming events".to_string()];
    if data.upcoming_events.is_empty() {
        lines.push("  none".to_string());
    }
    for event in &data.upcoming_events {
        let when = event
            .time
            .as_ref()
            .map_or_else(|| event.date.to_string(), |time| format!("{} {time}", event.date));
        let location = event.location.as_deref().unwrap_or_default();
        lines.push(format!("  {when:<16}  {}  {location}", event.title).trim_end().to_string());
    }

    lines.push("Upcoming birthdays".to_string());
    if data.upcoming_birthdays.is_empty() {
        lines.push("  none".to_string());
    }
    for birthday in &data.upcoming_birthdays {
        let days = match birthday.days_until {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            days => format!("in {days} days"),
        };
        lines.push(format!("  {}  {}  ({days})", birthday.next.format("%d/%m"), birthday.name));
    }

    lines.push("Recent notices".to_string());
    if data.recent_notices.is_empty() {
        lines.push("  none".to_string());
    }
    lines.extend(
        format_record_lines(Collection::Notices, &data.recent_notices)
            .into_iter()
            .map(|line| format!("  {line}")),
    );
    lines
}
