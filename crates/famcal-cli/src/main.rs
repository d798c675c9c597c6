use clap::Parser;
use famcal_core::db;
use famcal_core::error::CoreError;
use famcal_core::repository::SqliteRepository;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    let config = config::Config::new().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring invalid configuration");
        config::Config::default()
    });

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool).with_config(config.recurrence.clone());

    let result = match cli.command {
        cli::Commands::Member(command) => {
            commands::member::member_command(&repository, command, &config).await
        }
        cli::Commands::Add(command) => commands::add::add_event(&repository, command, &config).await,
        cli::Commands::List(command) => {
            commands::list::list_events(&repository, command, &config).await
        }
        cli::Commands::Show(command) => commands::show::show_event(&repository, command).await,
        cli::Commands::Edit(command) => commands::edit::edit_event(&repository, command).await,
        cli::Commands::Delete(command) => {
            commands::delete::delete_event(&repository, command).await
        }
        cli::Commands::Done(command) => commands::done::mark_done(&repository, command, &config).await,
        cli::Commands::Undo(command) => commands::done::undo_done(&repository, command, &config).await,
        cli::Commands::Status(command) => commands::status::show_status(&repository, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::RangeTooLarge { .. } => {
                eprintln!("{} {}", "Error:".style(error_style), core_error);
                eprintln!("Narrow the range with --from and --to.");
            }
            CoreError::OccurrenceNotOnPattern { event_id, date } => {
                eprintln!(
                    "{} Event {} has no occurrence on {}",
                    "Error:".style(error_style),
                    event_id,
                    date.yellow()
                );
            }
            CoreError::ScopeRequiresRecurrence(scope) => {
                eprintln!(
                    "{} Scope {} needs the event to keep repeating. Use --scope this to change a single occurrence.",
                    "Error:".style(error_style),
                    scope.yellow()
                );
            }
            CoreError::RewardReclaim(s) => {
                eprintln!(
                    "{} Completion kept, the reward could not be taken back: {}",
                    "Error:".style(error_style),
                    s
                );
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
    }
}
