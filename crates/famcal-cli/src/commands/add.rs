use anyhow::Result;
use famcal_core::models::EventDraft;
use famcal_core::repository::{EventRepository, Repository};
use owo_colors::OwoColorize;

use crate::cli::AddCommand;
use crate::config::Config;
use crate::parser::parse_date_time;
use crate::util::{build_recurrence, resolve_family, resolve_member};

pub async fn add_event(repo: &impl Repository, command: AddCommand, config: &Config) -> Result<()> {
    let family_id = resolve_family(command.family, config)?;
    let created_by_id = resolve_member(command.member, config)?;

    let mut draft = EventDraft::new(command.title, parse_date_time(&command.at)?);
    draft.end_date_time = command.end.as_deref().map(parse_date_time).transpose()?;
    draft.description = command.description;
    draft.location = command.location;
    draft.is_all_day = command.all_day;
    draft.is_task = command.task;
    draft.xp_points = command.xp;
    draft.is_required = command.required;
    draft.participant_ids = command.participants;
    draft.recurrence = build_recurrence(&command.recurrence)?;

    let event = repo.create_event(family_id, created_by_id, draft).await?;

    let what = match (event.is_recurring(), event.is_task) {
        (true, true) => "recurring task",
        (true, false) => "recurring event",
        (false, true) => "task",
        (false, false) => "event",
    };
    println!("{} {} '{}'", "Created".green(), what, event.title);
    println!("  id: {}", event.id);
    if let Some(recurrence) = &event.recurrence {
        if let Some(end_date) = recurrence.end_date {
            println!("  repeats {} until {}", recurrence.recurring_type, end_date);
        }
    }
    Ok(())
}
