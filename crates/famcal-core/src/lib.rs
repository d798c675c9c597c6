//! # Famcal Core Library
//!
//! Calendar engine for a family organizer: events that recur daily, weekly,
//! monthly or yearly, per-occurrence overrides and exclusions, scoped edits of
//! recurring series, and per-member completion of task occurrences.
//!
//! ## Features
//!
//! - **On-the-fly Expansion**: recurring events are stored once and expanded
//!   into instances for the requested range only
//! - **Exceptions**: a single occurrence can be replaced by a standalone event
//!   or excluded from its series
//! - **Scoped Edits**: updates and deletes apply to one occurrence, to the
//!   occurrence and every later one, or to the whole series
//! - **Task Completion**: members of the event's family complete individual
//!   occurrences, with optional food rewards
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and configuration
//! - [`recurrence`]: Occurrence generation and pattern validation
//! - [`repository`]: Data access layer with the Repository pattern
//! - [`collaborators`]: Member directory, reward and cache seams
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use famcal_core::{
//!     db,
//!     models::{EventDraft, NewMember, Recurrence, RecurringType},
//!     repository::{EventRepository, MemberRepository, OccurrenceRepository, SqliteRepository},
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("famcal.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let family_id = Uuid::now_v7();
//!     let parent = repo
//!         .add_member(NewMember { family_id, name: "Sam".to_string() })
//!         .await?;
//!
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(18, 0, 0).unwrap();
//!     let mut draft = EventDraft::new("Take out the bins", start);
//!     draft.recurrence = Some(Recurrence::new(RecurringType::Weekly));
//!     draft.is_task = true;
//!     repo.create_event(family_id, parent.id, draft).await?;
//!
//!     let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();
//!     for entry in repo.occurrences_in_range(family_id, start, end).await? {
//!         println!("{} {}", entry.occurrence_date, entry.event.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod collaborators;
pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
