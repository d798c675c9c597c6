use anyhow::Result;
use famcal_core::models::NewMember;
use famcal_core::repository::{MemberRepository, Repository};
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::cli::{MemberAction, MemberCommand};
use crate::config::Config;
use crate::util::resolve_family;
use crate::views::table::display_members;

pub async fn member_command(
    repo: &impl Repository,
    command: MemberCommand,
    config: &Config,
) -> Result<()> {
    match command.action {
        MemberAction::Add { name, family } => {
            let family_id = family
                .or(config.default_family)
                .unwrap_or_else(Uuid::now_v7);
            let member = repo.add_member(NewMember { family_id, name }).await?;
            println!("{} member '{}'", "Added".green(), member.name);
            println!("  id:     {}", member.id);
            println!("  family: {}", member.family_id);
        }
        MemberAction::List { family } => {
            let family_id = resolve_family(family, config)?;
            let members = repo.find_members_by_family(family_id).await?;
            display_members(&members);
        }
    }
    Ok(())
}
