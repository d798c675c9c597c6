use anyhow::Result;
use famcal_core::error::CoreError;
use famcal_core::models::{EditScope, EventDraft};
use famcal_core::repository::{EventRepository, Repository, ScopedMutationRepository};
use owo_colors::OwoColorize;

use crate::cli::EditCommand;
use crate::parser::parse_date_time;
use crate::util::{build_recurrence, occurrence_date, resolve_scope};

pub async fn edit_event(repo: &impl Repository, command: EditCommand) -> Result<()> {
    let base = repo
        .find_event_by_id(command.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", command.id)))?;

    let scope = resolve_scope(&base, command.scope, "edit")?;
    let date = occurrence_date(&base, command.on.as_deref(), scope)?;

    let mut draft = EventDraft::from(&base);

    // A single occurrence keeps its own slot unless a new start is given.
    if base.is_recurring() && scope == EditScope::This {
        let start = date.and_time(base.start_date_time.time());
        draft.end_date_time = base.duration().map(|duration| start + duration);
        draft.start_date_time = start;
    }

    if let Some(title) = command.title {
        draft.title = title;
    }
    if let Some(at) = &command.at {
        let start = parse_date_time(at)?;
        let duration = draft.end_date_time.map(|end| end - draft.start_date_time);
        draft.start_date_time = start;
        draft.end_date_time = duration.map(|duration| start + duration);
    }
    if let Some(end) = &command.end {
        draft.end_date_time = Some(parse_date_time(end)?);
    }
    if let Some(description) = command.description {
        draft.description = Some(description);
    }
    if let Some(location) = command.location {
        draft.location = Some(location);
    }
    if command.all_day {
        draft.is_all_day = true;
    } else if command.timed {
        draft.is_all_day = false;
    }
    if command.task {
        draft.is_task = true;
    } else if command.no_task {
        draft.is_task = false;
        draft.xp_points = None;
    }
    if let Some(xp) = command.xp {
        draft.xp_points = Some(xp);
    }
    if command.required {
        draft.is_required = true;
    } else if command.optional {
        draft.is_required = false;
    }
    if !command.participants.is_empty() {
        draft.participant_ids = command.participants;
    }
    if command.no_repeat {
        draft.recurrence = None;
    } else if let Some(recurrence) = build_recurrence(&command.recurrence)? {
        draft.recurrence = Some(recurrence);
    }

    let event = repo
        .update_event_with_scope(base.id, date, scope, draft)
        .await?;

    if base.is_recurring() {
        let what = match scope {
            EditScope::This => format!("occurrence on {}", date),
            EditScope::ThisAndFollowing => format!("occurrences from {}", date),
            EditScope::All => "all occurrences".to_string(),
        };
        println!("{} {} of '{}'", "Updated".green(), what, base.title);
    } else {
        println!("{} '{}'", "Updated".green(), event.title);
    }
    if event.id != base.id {
        println!("  id: {}", event.id);
    }
    Ok(())
}
