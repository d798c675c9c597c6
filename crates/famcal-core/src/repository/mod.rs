use crate::collaborators::{
    CacheInvalidator, MemberDirectory, NoCache, NoRewards, RewardService,
};
use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    EditScope, Event, EventDraft, EventException, ExceptionInsert, Member, NewEventException,
    NewMember, Recurrence, RecurrenceConfig, RecurringType, ScheduledEvent, TaskCompletion,
};
use crate::recurrence::OccurrenceGenerator;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub mod completions;
pub mod events;
pub mod exceptions;
pub mod members;
pub mod occurrences;
pub mod query_builder;
pub mod scoped;

pub use members::SqliteMemberDirectory;

/// Row shape of the `events` table. Participants live in their own table and
/// are attached when the row is turned into an [`Event`].
#[derive(Debug, Clone, FromRow)]
pub(crate) struct EventRow {
    pub id: Uuid,
    pub family_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: Option<NaiveDateTime>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub created_by_id: Uuid,
    pub recurring_type: Option<RecurringType>,
    pub recurring_interval: Option<i64>,
    pub recurring_end_date: Option<NaiveDate>,
    pub recurring_end_count: Option<i64>,
    pub is_task: bool,
    pub xp_points: Option<i32>,
    pub is_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    pub(crate) fn into_event(self, participant_ids: BTreeSet<Uuid>) -> Event {
        let recurrence = self.recurring_type.map(|recurring_type| Recurrence {
            recurring_type,
            interval: self
                .recurring_interval
                .and_then(|interval| u32::try_from(interval).ok())
                .unwrap_or(1)
                .max(1),
            end_date: self.recurring_end_date,
            end_count: self
                .recurring_end_count
                .and_then(|count| u32::try_from(count).ok()),
        });

        Event {
            id: self.id,
            family_id: self.family_id,
            category_id: self.category_id,
            title: self.title,
            description: self.description,
            start_date_time: self.start_date_time,
            end_date_time: self.end_date_time,
            is_all_day: self.is_all_day,
            location: self.location,
            created_by_id: self.created_by_id,
            recurrence,
            is_task: self.is_task,
            xp_points: self.xp_points,
            is_required: self.is_required,
            participant_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Domain-specific trait for plain event operations
#[async_trait]
pub trait EventRepository {
    async fn create_event(
        &self,
        family_id: Uuid,
        created_by_id: Uuid,
        draft: EventDraft,
    ) -> Result<Event, CoreError>;
    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>, CoreError>;
    async fn find_events_by_family(&self, family_id: Uuid) -> Result<Vec<Event>, CoreError>;
    /// Replaces every editable field of the event with the draft.
    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Event, CoreError>;
    async fn delete_event(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for per-occurrence exceptions
#[async_trait]
pub trait ExceptionRepository {
    async fn find_exception(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Option<EventException>, CoreError>;
    async fn find_exceptions_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<Vec<EventException>, CoreError>;
    async fn find_excluded_dates_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashSet<NaiveDate>>, CoreError>;
    async fn try_insert_exception(
        &self,
        exception: NewEventException,
    ) -> Result<ExceptionInsert, CoreError>;
    async fn remove_exception(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<(), CoreError>;
}

/// Domain-specific trait for calendar range queries
#[async_trait]
pub trait OccurrenceRepository {
    async fn occurrences_in_range(
        &self,
        family_id: Uuid,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<ScheduledEvent>, CoreError>;
}

/// Domain-specific trait for edits and deletes of recurring series
#[async_trait]
pub trait ScopedMutationRepository {
    async fn update_event_with_scope(
        &self,
        id: Uuid,
        occurrence_date: NaiveDate,
        scope: EditScope,
        draft: EventDraft,
    ) -> Result<Event, CoreError>;
    async fn delete_event_with_scope(
        &self,
        id: Uuid,
        occurrence_date: NaiveDate,
        scope: EditScope,
    ) -> Result<(), CoreError>;
}

/// Domain-specific trait for task completion
#[async_trait]
pub trait CompletionRepository {
    async fn mark_task_completed(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<TaskCompletion, CoreError>;
    async fn unmark_task_completed(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<(), CoreError>;
    async fn is_task_completed(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<bool, CoreError>;
    async fn find_task_completions(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Vec<TaskCompletion>, CoreError>;
}

/// Domain-specific trait for the stored member records
#[async_trait]
pub trait MemberRepository {
    async fn add_member(&self, member: NewMember) -> Result<Member, CoreError>;
    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, CoreError>;
    async fn find_members_by_family(&self, family_id: Uuid) -> Result<Vec<Member>, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    EventRepository
    + ExceptionRepository
    + OccurrenceRepository
    + ScopedMutationRepository
    + CompletionRepository
    + MemberRepository
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    generator: OccurrenceGenerator,
    members: Arc<dyn MemberDirectory>,
    rewards: Arc<dyn RewardService>,
    cache: Arc<dyn CacheInvalidator>,
}

impl SqliteRepository {
    /// Repository backed by `pool`, using the stored members, no rewards and no
    /// cache. Use the `with_*` methods to plug in other collaborators.
    pub fn new(pool: DbPool) -> Self {
        Self {
            members: Arc::new(SqliteMemberDirectory::new(pool.clone())),
            pool,
            generator: OccurrenceGenerator::with_defaults(),
            rewards: Arc::new(NoRewards),
            cache: Arc::new(NoCache),
        }
    }

    pub fn with_config(mut self, config: RecurrenceConfig) -> Self {
        self.generator = OccurrenceGenerator::new(config);
        self
    }

    pub fn with_member_directory(mut self, members: Arc<dyn MemberDirectory>) -> Self {
        self.members = members;
        self
    }

    pub fn with_reward_service(mut self, rewards: Arc<dyn RewardService>) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_cache_invalidator(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Transaction holding the write lock from its first statement, like
    /// `BEGIN IMMEDIATE`. Concurrent writers wait on the busy timeout and then
    /// read what the previous writer committed, instead of failing with
    /// `SQLITE_BUSY` on a stale snapshot.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, CoreError> {
        let mut tx = self.pool.begin().await?;
        // Matches no rows but still opens the write transaction.
        sqlx::query("UPDATE events SET id = id WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    pub(crate) fn generator(&self) -> &OccurrenceGenerator {
        &self.generator
    }

    pub(crate) fn member_directory(&self) -> &dyn MemberDirectory {
        self.members.as_ref()
    }

    pub(crate) fn reward_service(&self) -> &dyn RewardService {
        self.rewards.as_ref()
    }

    /// Post-commit notification for every write path.
    pub(crate) fn invalidate_family(&self, family_id: Uuid) {
        self.cache.invalidate_family(family_id);
    }
}

impl Repository for SqliteRepository {}
