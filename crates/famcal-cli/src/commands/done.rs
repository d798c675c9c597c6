use anyhow::Result;
use famcal_core::error::CoreError;
use famcal_core::repository::{CompletionRepository, EventRepository, Repository};
use owo_colors::OwoColorize;

use crate::cli::CompletionCommand;
use crate::config::Config;
use crate::util::{completion_date, resolve_member};

pub async fn mark_done(repo: &impl Repository, command: CompletionCommand, config: &Config) -> Result<()> {
    let member_id = resolve_member(command.member, config)?;
    let event = repo
        .find_event_by_id(command.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", command.id)))?;
    let date = completion_date(&event, command.on.as_deref())?;

    let completion = repo.mark_task_completed(event.id, member_id, date).await?;
    println!(
        "{} '{}' on {} ({} xp)",
        "Completed".green().bold(),
        event.title,
        completion.occurrence_date,
        event.xp_points.unwrap_or(1)
    );
    Ok(())
}

pub async fn undo_done(repo: &impl Repository, command: CompletionCommand, config: &Config) -> Result<()> {
    let member_id = resolve_member(command.member, config)?;
    let event = repo
        .find_event_by_id(command.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", command.id)))?;
    let date = completion_date(&event, command.on.as_deref())?;

    repo.unmark_task_completed(event.id, member_id, date).await?;
    println!("{} completion of '{}' on {}", "Removed".yellow(), event.title, date);
    Ok(())
}
