use anyhow::Result;
use famcal_core::error::CoreError;
use famcal_core::repository::{EventRepository, Repository};

use crate::cli::ShowCommand;
use crate::views::table::display_event;

pub async fn show_event(repo: &impl Repository, command: ShowCommand) -> Result<()> {
    let event = repo
        .find_event_by_id(command.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", command.id)))?;
    display_event(&event);
    Ok(())
}
