use crate::error::CoreError;
use crate::models::{Event, EventDraft};
use crate::recurrence::normalize_recurrence;
use crate::repository::query_builder::SqlQueryBuilder;
use crate::repository::{EventRow, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::EventRepository for SqliteRepository {
    async fn create_event(
        &self,
        family_id: Uuid,
        created_by_id: Uuid,
        draft: EventDraft,
    ) -> Result<Event, CoreError> {
        let draft = Self::normalize_draft(draft)?;

        let mut tx = self.begin_write().await?;
        let event =
            Self::insert_event_in_transaction(&mut tx, family_id, created_by_id, draft).await?;
        tx.commit().await?;

        self.invalidate_family(family_id);
        tracing::info!(event_id = %event.id, %family_id, recurring = event.is_recurring(), "created event");
        Ok(event)
    }

    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<Event>, CoreError> {
        let mut tx = self.pool().begin().await?;
        let event = Self::find_event_by_id_in_transaction(&mut tx, id).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn find_events_by_family(&self, family_id: Uuid) -> Result<Vec<Event>, CoreError> {
        let mut tx = self.pool().begin().await?;
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM events WHERE family_id = $1 ORDER BY start_date_time, id",
        )
        .bind(family_id)
        .fetch_all(&mut *tx)
        .await?;
        let events = Self::attach_participants_in_transaction(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(events)
    }

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Event, CoreError> {
        let draft = Self::normalize_draft(draft)?;

        let mut tx = self.begin_write().await?;
        let existing = Self::find_event_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", id)))?;

        if draft.recurrence.is_some() && Self::is_modified_event_in_transaction(&mut tx, id).await? {
            return Err(CoreError::InvalidInput(
                "An edited occurrence cannot be made recurring".to_string(),
            ));
        }

        let event = Self::update_event_in_transaction(&mut tx, &existing, draft).await?;
        tx.commit().await?;

        self.invalidate_family(event.family_id);
        tracing::info!(event_id = %id, "updated event");
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.begin_write().await?;
        let event = Self::find_event_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", id)))?;
        Self::delete_event_in_transaction(&mut tx, id).await?;
        tx.commit().await?;

        self.invalidate_family(event.family_id);
        tracing::info!(event_id = %id, "deleted event");
        Ok(())
    }
}

impl SqliteRepository {
    /// Checks the draft against the event invariants and fills in defaults:
    /// task XP defaults to 1, non-task XP is dropped, and a recurrence without
    /// any end bound receives the default horizon for its type.
    pub(crate) fn normalize_draft(mut draft: EventDraft) -> Result<EventDraft, CoreError> {
        draft.title = draft.title.trim().to_string();
        if draft.title.is_empty() {
            return Err(CoreError::InvalidInput("Event title cannot be empty".to_string()));
        }

        if let Some(end) = draft.end_date_time {
            if end < draft.start_date_time {
                return Err(CoreError::InvalidInput(format!(
                    "Event end {} is before its start {}",
                    end, draft.start_date_time
                )));
            }
        }

        if draft.is_task {
            draft.xp_points = Some(draft.xp_points.unwrap_or(1));
        } else {
            if draft.xp_points.is_some_and(|xp| xp != 0) {
                return Err(CoreError::InvalidInput("xpPoints requires isTask".to_string()));
            }
            draft.xp_points = None;
        }

        draft.recurrence = normalize_recurrence(draft.start_date_time, draft.recurrence)?;
        Ok(draft)
    }

    /// Find an event by ID within an existing transaction
    pub(crate) async fn find_event_by_id_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<Option<Event>, CoreError> {
        let row: Option<EventRow> = sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => {
                let mut events = Self::attach_participants_in_transaction(tx, vec![row]).await?;
                Ok(events.pop())
            }
            None => Ok(None),
        }
    }

    /// Loads events by id, in no particular order. Missing ids are skipped.
    pub(crate) async fn find_events_by_ids_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        ids: &[Uuid],
    ) -> Result<Vec<Event>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM events WHERE ");
        SqlQueryBuilder::push_id_list(&mut qb, "id", ids);
        let rows: Vec<EventRow> = qb.build_query_as().fetch_all(&mut **tx).await?;

        Self::attach_participants_in_transaction(tx, rows).await
    }

    /// Turns rows into events, loading all participants with one query.
    pub(crate) async fn attach_participants_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rows: Vec<EventRow>,
    ) -> Result<Vec<Event>, CoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT event_id, member_id FROM event_participants WHERE ");
        SqlQueryBuilder::push_id_list(&mut qb, "event_id", &ids);
        let pairs: Vec<(Uuid, Uuid)> = qb.build_query_as().fetch_all(&mut **tx).await?;

        let mut participants: HashMap<Uuid, BTreeSet<Uuid>> = HashMap::new();
        for (event_id, member_id) in pairs {
            participants.entry(event_id).or_default().insert(member_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let ids = participants.remove(&row.id).unwrap_or_default();
                row.into_event(ids)
            })
            .collect())
    }

    /// Insert an already normalized draft within an existing transaction
    pub(crate) async fn insert_event_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        family_id: Uuid,
        created_by_id: Uuid,
        draft: EventDraft,
    ) -> Result<Event, CoreError> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::now_v7(),
            family_id,
            category_id: draft.category_id,
            title: draft.title,
            description: draft.description,
            start_date_time: draft.start_date_time,
            end_date_time: draft.end_date_time,
            is_all_day: draft.is_all_day,
            location: draft.location,
            created_by_id,
            recurrence: draft.recurrence,
            is_task: draft.is_task,
            xp_points: draft.xp_points,
            is_required: draft.is_required,
            participant_ids: draft.participant_ids.into_iter().collect(),
            created_at: now,
            updated_at: now,
        };

        let recurrence = event.recurrence.as_ref();
        sqlx::query(
            r#"INSERT INTO events (
                id, family_id, category_id, title, description, start_date_time, end_date_time,
                is_all_day, location, created_by_id, recurring_type, recurring_interval,
                recurring_end_date, recurring_end_count, is_task, xp_points, is_required,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"#,
        )
        .bind(event.id)
        .bind(event.family_id)
        .bind(event.category_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_date_time)
        .bind(event.end_date_time)
        .bind(event.is_all_day)
        .bind(&event.location)
        .bind(event.created_by_id)
        .bind(recurrence.map(|r| r.recurring_type))
        .bind(recurrence.map(|r| i64::from(r.interval)))
        .bind(recurrence.and_then(|r| r.end_date))
        .bind(recurrence.and_then(|r| r.end_count).map(i64::from))
        .bind(event.is_task)
        .bind(event.xp_points)
        .bind(event.is_required)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut **tx)
        .await?;

        Self::replace_participants_in_transaction(tx, event.id, &event.participant_ids).await?;

        Ok(event)
    }

    /// Overwrite every editable field of `existing` with an already normalized draft
    pub(crate) async fn update_event_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        existing: &Event,
        draft: EventDraft,
    ) -> Result<Event, CoreError> {
        let event = Event {
            category_id: draft.category_id,
            title: draft.title,
            description: draft.description,
            start_date_time: draft.start_date_time,
            end_date_time: draft.end_date_time,
            is_all_day: draft.is_all_day,
            location: draft.location,
            recurrence: draft.recurrence,
            is_task: draft.is_task,
            xp_points: draft.xp_points,
            is_required: draft.is_required,
            participant_ids: draft.participant_ids.into_iter().collect(),
            updated_at: Utc::now(),
            ..existing.clone()
        };

        let recurrence = event.recurrence.as_ref();
        sqlx::query(
            r#"UPDATE events SET
                category_id = $1, title = $2, description = $3, start_date_time = $4,
                end_date_time = $5, is_all_day = $6, location = $7, recurring_type = $8,
                recurring_interval = $9, recurring_end_date = $10, recurring_end_count = $11,
                is_task = $12, xp_points = $13, is_required = $14, updated_at = $15
            WHERE id = $16"#,
        )
        .bind(event.category_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_date_time)
        .bind(event.end_date_time)
        .bind(event.is_all_day)
        .bind(&event.location)
        .bind(recurrence.map(|r| r.recurring_type))
        .bind(recurrence.map(|r| i64::from(r.interval)))
        .bind(recurrence.and_then(|r| r.end_date))
        .bind(recurrence.and_then(|r| r.end_count).map(i64::from))
        .bind(event.is_task)
        .bind(event.xp_points)
        .bind(event.is_required)
        .bind(event.updated_at)
        .bind(event.id)
        .execute(&mut **tx)
        .await?;

        if event.participant_ids != existing.participant_ids {
            Self::replace_participants_in_transaction(tx, event.id, &event.participant_ids)
                .await?;
        }

        Ok(event)
    }

    pub(crate) async fn replace_participants_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_id: Uuid,
        participant_ids: &BTreeSet<Uuid>,
    ) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM event_participants WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut **tx)
            .await?;

        if !participant_ids.is_empty() {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO event_participants (event_id, member_id) ");
            query_builder.push_values(participant_ids.iter(), |mut b, member_id| {
                b.push_bind(event_id).push_bind(*member_id);
            });
            query_builder.build().execute(&mut **tx).await?;
        }

        Ok(())
    }

    /// Deletes an event together with the standalone events that override its
    /// occurrences. Exceptions and participants go with it through the
    /// foreign keys.
    pub(crate) async fn delete_event_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"DELETE FROM events WHERE id IN (
                SELECT modified_event_id FROM event_exceptions
                WHERE event_id = $1 AND modified_event_id IS NOT NULL
            )"#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Event with id {} not found", id)));
        }
        Ok(())
    }

    /// Whether the event replaces an occurrence of some recurring series.
    pub(crate) async fn is_modified_event_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<bool, CoreError> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM event_exceptions WHERE modified_event_id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(found.is_some())
    }
}
