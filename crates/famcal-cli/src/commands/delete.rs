use anyhow::Result;
use dialoguer::Confirm;
use famcal_core::error::CoreError;
use famcal_core::models::EditScope;
use famcal_core::repository::{EventRepository, Repository, ScopedMutationRepository};
use owo_colors::OwoColorize;

use crate::cli::DeleteCommand;
use crate::util::{occurrence_date, resolve_scope};

pub async fn delete_event(repo: &impl Repository, command: DeleteCommand) -> Result<()> {
    let base = repo
        .find_event_by_id(command.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", command.id)))?;

    let scope = resolve_scope(&base, command.scope, "delete")?;
    let date = occurrence_date(&base, command.on.as_deref(), scope)?;

    let what = if base.is_recurring() {
        match scope {
            EditScope::This => format!("the occurrence on {} of '{}'", date, base.title),
            EditScope::ThisAndFollowing => {
                format!("every occurrence of '{}' from {}", base.title, date)
            }
            EditScope::All => format!("every occurrence of '{}'", base.title),
        }
    } else {
        format!("'{}'", base.title)
    };

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!("Are you sure you want to delete {}?", what))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    repo.delete_event_with_scope(base.id, date, scope).await?;
    println!("{} {}", "Deleted".red(), what);
    Ok(())
}
