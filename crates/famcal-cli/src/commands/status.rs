use anyhow::Result;
use famcal_core::error::CoreError;
use famcal_core::repository::{CompletionRepository, EventRepository, MemberRepository, Repository};
use owo_colors::OwoColorize;
use std::collections::HashMap;

use crate::cli::StatusCommand;
use crate::util::completion_date;
use crate::views::table::display_completions;

pub async fn show_status(repo: &impl Repository, command: StatusCommand) -> Result<()> {
    let event = repo
        .find_event_by_id(command.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", command.id)))?;
    let date = completion_date(&event, command.on.as_deref())?;

    if !repo.is_task_completed(event.id, date).await? {
        println!("'{}' on {} is {}", event.title, date, "not completed".yellow());
        return Ok(());
    }

    let completions = repo.find_task_completions(event.id, date).await?;
    let names: HashMap<_, _> = repo
        .find_members_by_family(event.family_id)
        .await?
        .into_iter()
        .map(|member| (member.id, member.name))
        .collect();

    println!("'{}' on {} is {}", event.title, date, "completed".green());
    display_completions(&completions, &names);
    Ok(())
}
