use anyhow::Result;
use chrono::{Duration, Local, NaiveTime};
use famcal_core::repository::{OccurrenceRepository, Repository};

use crate::cli::ListCommand;
use crate::config::Config;
use crate::parser::parse_date;
use crate::util::resolve_family;
use crate::views::table::display_schedule;

pub async fn list_events(repo: &impl Repository, command: ListCommand, config: &Config) -> Result<()> {
    let family_id = resolve_family(command.family, config)?;

    let from = match &command.from {
        Some(from) => parse_date(from)?,
        None => Local::now().date_naive(),
    };
    let to = match &command.to {
        Some(to) => parse_date(to)?,
        None => from + Duration::days(6),
    };
    let range_start = from.and_time(NaiveTime::MIN);
    let range_end = to.and_hms_opt(23, 59, 59).unwrap_or(range_start);

    let entries = repo
        .occurrences_in_range(family_id, range_start, range_end)
        .await?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        display_schedule(&entries);
    }
    Ok(())
}
