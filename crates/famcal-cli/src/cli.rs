use clap::{Args, Parser, Subcommand};
use famcal_core::models::{EditScope, RecurringType};
use uuid::Uuid;

/// A shared family calendar with recurring events and tasks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage family members
    Member(MemberCommand),
    /// Add a new event or task
    Add(AddCommand),
    /// Show the calendar for a date range
    List(ListCommand),
    /// Show one stored event
    Show(ShowCommand),
    /// Edit an event, one occurrence or part of a series
    Edit(EditCommand),
    /// Delete an event, one occurrence or part of a series
    Delete(DeleteCommand),
    /// Mark a task occurrence as completed
    Done(CompletionCommand),
    /// Take back a completion
    Undo(CompletionCommand),
    /// Show who completed a task occurrence
    Status(StatusCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct MemberCommand {
    #[command(subcommand)]
    pub action: MemberAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MemberAction {
    /// Add a member, starting a new family unless one is given
    Add {
        /// Display name of the member
        name: String,
        /// Family to join
        #[arg(long)]
        family: Option<Uuid>,
    },
    /// List the members of a family
    List {
        #[arg(long)]
        family: Option<Uuid>,
    },
}

/// Recurrence flags shared by `add` and `edit`.
#[derive(Args, Debug, Clone, Default)]
pub struct RecurrenceArgs {
    /// Repeat daily, weekly, monthly or yearly
    #[arg(long)]
    pub every: Option<RecurringType>,
    /// Number of periods between occurrences
    #[arg(long, requires = "every")]
    pub interval: Option<u32>,
    /// Last date the series may produce an occurrence on
    #[arg(long, requires = "every")]
    pub until: Option<String>,
    /// Total number of occurrences
    #[arg(long, requires = "every")]
    pub count: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// Title of the event
    pub title: String,
    /// Start, e.g. "2024-03-04 09:00" or "next monday 9am"
    #[clap(short, long)]
    pub at: String,
    /// End of the event
    #[clap(short, long)]
    pub end: Option<String>,
    /// Family the event belongs to
    #[arg(long)]
    pub family: Option<Uuid>,
    /// Member creating the event
    #[arg(long)]
    pub member: Option<Uuid>,
    #[clap(short, long)]
    pub description: Option<String>,
    #[clap(short, long)]
    pub location: Option<String>,
    #[arg(long)]
    pub all_day: bool,
    /// Turn the event into a task that members can complete
    #[arg(long)]
    pub task: bool,
    /// Food reward for completing the task
    #[arg(long)]
    pub xp: Option<i32>,
    /// Mark the task as required
    #[arg(long)]
    pub required: bool,
    /// Participating member, may be repeated
    #[arg(long = "participant")]
    pub participants: Vec<Uuid>,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    #[arg(long)]
    pub family: Option<Uuid>,
    /// First day of the range, defaults to today
    #[arg(long)]
    pub from: Option<String>,
    /// Last day of the range, defaults to six days after `from`
    #[arg(long)]
    pub to: Option<String>,
    /// Print the entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    pub id: Uuid,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    pub id: Uuid,
    /// Occurrence to edit
    #[arg(long)]
    pub on: Option<String>,
    /// this, following or all
    #[arg(long)]
    pub scope: Option<EditScope>,
    #[clap(short, long)]
    pub title: Option<String>,
    #[clap(short, long)]
    pub at: Option<String>,
    #[clap(short, long)]
    pub end: Option<String>,
    #[clap(short, long)]
    pub description: Option<String>,
    #[clap(short, long)]
    pub location: Option<String>,
    #[arg(long, conflicts_with = "timed")]
    pub all_day: bool,
    #[arg(long)]
    pub timed: bool,
    #[arg(long, conflicts_with = "no_task")]
    pub task: bool,
    #[arg(long)]
    pub no_task: bool,
    #[arg(long)]
    pub xp: Option<i32>,
    #[arg(long, conflicts_with = "optional")]
    pub required: bool,
    #[arg(long)]
    pub optional: bool,
    /// Replace the participants, may be repeated
    #[arg(long = "participant")]
    pub participants: Vec<Uuid>,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
    /// Stop repeating
    #[arg(long, conflicts_with = "every")]
    pub no_repeat: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    pub id: Uuid,
    /// Occurrence to delete
    #[arg(long)]
    pub on: Option<String>,
    /// this, following or all
    #[arg(long)]
    pub scope: Option<EditScope>,
    /// Delete without asking for confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionCommand {
    pub id: Uuid,
    /// Occurrence date, defaults to the event's own date or today for a series
    #[arg(long)]
    pub on: Option<String>,
    /// Member completing the task
    #[arg(long)]
    pub member: Option<Uuid>,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    pub id: Uuid,
    #[arg(long)]
    pub on: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scope_accepts_short_names() {
        let id = Uuid::now_v7().to_string();
        let cli = Cli::try_parse_from(["famcal", "delete", &id, "--scope", "following"])
            .expect("parse delete");
        match cli.command {
            Commands::Delete(command) => {
                assert_eq!(command.scope, Some(EditScope::ThisAndFollowing))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn interval_needs_every() {
        let result = Cli::try_parse_from(["famcal", "add", "Walk", "--at", "2024-01-01 09:00", "--interval", "2"]);
        assert!(result.is_err());
    }
}
