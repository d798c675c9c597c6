use crate::error::CoreError;
use crate::models::{EditScope, Event, EventDraft, NewEventException};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::ScopedMutationRepository for SqliteRepository {
    /// Applies `draft` to one occurrence, to the occurrence and every later
    /// one, or to the whole series.
    ///
    /// # Behavior
    ///
    /// - `This`: the base event is untouched; the occurrence is replaced by a
    ///   standalone copy carrying the draft. Editing it again replaces that copy.
    /// - `ThisAndFollowing`: the series ends the day before `occurrence_date`
    ///   and a new series carrying the draft starts on `occurrence_date`.
    /// - `All`: the base event is updated in place.
    ///
    /// Events that do not recur are updated in place whatever the scope.
    async fn update_event_with_scope(
        &self,
        id: Uuid,
        occurrence_date: NaiveDate,
        scope: EditScope,
        draft: EventDraft,
    ) -> Result<Event, CoreError> {
        let mut tx = self.begin_write().await?;
        let base = Self::find_event_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", id)))?;

        let event = if !base.is_recurring() {
            let draft = Self::normalize_draft(draft)?;
            if draft.recurrence.is_some() && Self::is_modified_event_in_transaction(&mut tx, id).await? {
                return Err(CoreError::InvalidInput(
                    "An edited occurrence cannot be made recurring".to_string(),
                ));
            }
            Self::update_event_in_transaction(&mut tx, &base, draft).await?
        } else {
            match scope {
                EditScope::This => {
                    self.update_occurrence_in_transaction(&mut tx, &base, occurrence_date, draft)
                        .await?
                }
                EditScope::ThisAndFollowing => {
                    if draft.recurrence.is_none() {
                        return Err(CoreError::ScopeRequiresRecurrence(scope));
                    }
                    if occurrence_date <= base.occurrence_date() {
                        let draft = Self::normalize_draft(draft)?;
                        Self::update_event_in_transaction(&mut tx, &base, draft).await?
                    } else {
                        Self::split_series_in_transaction(&mut tx, &base, occurrence_date, draft)
                            .await?
                    }
                }
                EditScope::All => {
                    if draft.recurrence.is_none() {
                        return Err(CoreError::ScopeRequiresRecurrence(scope));
                    }
                    let draft = Self::normalize_draft(draft)?;
                    Self::update_event_in_transaction(&mut tx, &base, draft).await?
                }
            }
        };

        tx.commit().await?;
        self.invalidate_family(base.family_id);
        tracing::info!(
            event_id = %id,
            %occurrence_date,
            %scope,
            result_id = %event.id,
            "updated event with scope"
        );
        Ok(event)
    }

    async fn delete_event_with_scope(
        &self,
        id: Uuid,
        occurrence_date: NaiveDate,
        scope: EditScope,
    ) -> Result<(), CoreError> {
        let mut tx = self.begin_write().await?;
        let base = Self::find_event_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", id)))?;

        if !base.is_recurring() {
            Self::delete_event_in_transaction(&mut tx, id).await?;
        } else {
            match scope {
                EditScope::This => {
                    self.exclude_occurrence_in_transaction(&mut tx, &base, occurrence_date)
                        .await?;
                }
                EditScope::ThisAndFollowing if occurrence_date > base.occurrence_date() => {
                    Self::truncate_series_in_transaction(&mut tx, &base, occurrence_date).await?;
                }
                EditScope::ThisAndFollowing | EditScope::All => {
                    Self::delete_event_in_transaction(&mut tx, id).await?;
                }
            }
        }

        tx.commit().await?;
        self.invalidate_family(base.family_id);
        tracing::info!(event_id = %id, %occurrence_date, %scope, "deleted event with scope");
        Ok(())
    }
}

impl SqliteRepository {
    async fn ensure_on_pattern_in_transaction(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        base: &Event,
        occurrence_date: NaiveDate,
    ) -> Result<(), CoreError> {
        let excluded = Self::find_excluded_dates_in_transaction(tx, base.id).await?;
        self.generator()
            .validate_occurrence_date(base, occurrence_date, &excluded)
    }

    /// Replaces one occurrence with a standalone event built from `draft`.
    async fn update_occurrence_in_transaction(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        base: &Event,
        occurrence_date: NaiveDate,
        mut draft: EventDraft,
    ) -> Result<Event, CoreError> {
        self.ensure_on_pattern_in_transaction(tx, base, occurrence_date)
            .await?;

        draft.recurrence = None;
        let draft = Self::normalize_draft(draft)?;

        let exception = match Self::find_exception_in_transaction(tx, base.id, occurrence_date).await? {
            Some(existing) => existing,
            None => Self::try_insert_exception_in_transaction(
                tx,
                NewEventException {
                    event_id: base.id,
                    occurrence_date,
                    modified_event_id: None,
                },
            )
            .await?
            .into_exception(),
        };

        let modified =
            Self::insert_event_in_transaction(tx, base.family_id, base.created_by_id, draft).await?;
        Self::set_modified_event_in_transaction(tx, exception.id, Some(modified.id)).await?;

        if let Some(previous) = exception.modified_event_id {
            sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(previous)
                .execute(&mut **tx)
                .await?;
        }

        Ok(modified)
    }

    /// Leaves the occurrence without any event, dropping an earlier override.
    async fn exclude_occurrence_in_transaction(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        base: &Event,
        occurrence_date: NaiveDate,
    ) -> Result<(), CoreError> {
        self.ensure_on_pattern_in_transaction(tx, base, occurrence_date)
            .await?;

        if let Some(existing) = Self::find_exception_in_transaction(tx, base.id, occurrence_date).await? {
            Self::remove_exception_in_transaction(tx, &existing).await?;
        }

        let outcome = Self::try_insert_exception_in_transaction(
            tx,
            NewEventException {
                event_id: base.id,
                occurrence_date,
                modified_event_id: None,
            },
        )
        .await?;
        if !outcome.was_inserted() {
            tracing::debug!(event_id = %base.id, %occurrence_date, "occurrence already excluded");
        }
        Ok(())
    }

    /// Ends the series the day before `cut` and drops every exception from
    /// `cut` onwards.
    async fn truncate_series_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        base: &Event,
        cut: NaiveDate,
    ) -> Result<(), CoreError> {
        let last_day = cut
            .pred_opt()
            .ok_or_else(|| CoreError::InvalidInput(format!("Cannot end a series before {}", cut)))?;
        let end_date = base
            .recurrence
            .as_ref()
            .and_then(|recurrence| recurrence.end_date)
            .map_or(last_day, |existing| existing.min(last_day));

        sqlx::query("UPDATE events SET recurring_end_date = $1, updated_at = $2 WHERE id = $3")
            .bind(end_date)
            .bind(Utc::now())
            .bind(base.id)
            .execute(&mut **tx)
            .await?;

        let purged = Self::purge_exceptions_from_in_transaction(tx, base.id, cut).await?;
        tracing::debug!(event_id = %base.id, %end_date, purged, "truncated series");
        Ok(())
    }

    /// Truncates the series at `cut` and starts a new one on that date at the
    /// draft's time of day, keeping the draft's duration.
    async fn split_series_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        base: &Event,
        cut: NaiveDate,
        mut draft: EventDraft,
    ) -> Result<Event, CoreError> {
        Self::truncate_series_in_transaction(tx, base, cut).await?;

        let duration = draft.end_date_time.map(|end| end - draft.start_date_time);
        let start = cut.and_time(draft.start_date_time.time());
        draft.start_date_time = start;
        draft.end_date_time = duration.map(|duration| start + duration);
        let draft = Self::normalize_draft(draft)?;

        Self::insert_event_in_transaction(tx, base.family_id, base.created_by_id, draft).await
    }
}
