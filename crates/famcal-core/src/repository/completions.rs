use crate::error::CoreError;
use crate::models::TaskCompletion;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::CompletionRepository for SqliteRepository {
    /// Records that `member_id` completed the occurrence of task `event_id` on
    /// `occurrence_date`.
    ///
    /// # Returns
    ///
    /// The stored completion. Marking twice returns the first row unchanged
    /// and grants no second reward.
    ///
    /// # Behavior
    ///
    /// The food reward is granted after the commit. A reward failure is logged
    /// and does not undo the completion.
    async fn mark_task_completed(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<TaskCompletion, CoreError> {
        let member = self
            .member_directory()
            .find_member(member_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Member with id {} not found", member_id)))?;

        let mut tx = self.begin_write().await?;
        let event = Self::find_event_by_id_in_transaction(&mut tx, event_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", event_id)))?;

        if !event.is_task {
            return Err(CoreError::InvalidInput(format!(
                "Event {} is not a task",
                event_id
            )));
        }
        if member.family_id != event.family_id {
            return Err(CoreError::InvalidInput(format!(
                "Member {} does not belong to the family of event {}",
                member_id, event_id
            )));
        }

        let excluded = Self::find_excluded_dates_in_transaction(&mut tx, event_id).await?;
        self.generator()
            .validate_occurrence_date(&event, occurrence_date, &excluded)?;
        if excluded.contains(&occurrence_date) {
            return Err(CoreError::InvalidInput(format!(
                "Occurrence {} of event {} was edited or deleted",
                occurrence_date, event_id
            )));
        }

        if let Some(existing) =
            Self::find_completion_in_transaction(&mut tx, event_id, member_id, occurrence_date)
                .await?
        {
            tx.commit().await?;
            return Ok(existing);
        }

        let completion = TaskCompletion {
            id: Uuid::now_v7(),
            event_id,
            member_id,
            occurrence_date,
            completed_at: Utc::now(),
        };
        let inserted = sqlx::query(
            r#"INSERT INTO task_completions (id, event_id, member_id, occurrence_date, completed_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(completion.id)
        .bind(completion.event_id)
        .bind(completion.member_id)
        .bind(completion.occurrence_date)
        .bind(completion.completed_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                let existing =
                    Self::find_completion_in_transaction(&mut tx, event_id, member_id, occurrence_date)
                        .await?
                        .ok_or_else(|| {
                            CoreError::ConcurrencyConflict(format!(
                                "Completion of event {} on {} vanished after a conflicting insert",
                                event_id, occurrence_date
                            ))
                        })?;
                tx.commit().await?;
                return Ok(existing);
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        self.invalidate_family(event.family_id);
        tracing::info!(%event_id, %member_id, %occurrence_date, "marked task completed");

        let amount = event.xp_points.unwrap_or(1);
        if let Err(err) = self
            .reward_service()
            .grant_food_reward(member_id, event_id, amount)
            .await
        {
            tracing::warn!(
                %event_id,
                %member_id,
                amount,
                error = %err,
                "failed to grant food reward, completion kept"
            );
        }

        Ok(completion)
    }

    /// Removes the completion of `member_id`. Completions of other members of
    /// the same occurrence stay.
    ///
    /// The reward is taken back before the removal commits. If that fails the
    /// completion is kept and [`CoreError::RewardReclaim`] is returned.
    async fn unmark_task_completed(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<(), CoreError> {
        let mut tx = self.begin_write().await?;
        let event = Self::find_event_by_id_in_transaction(&mut tx, event_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event with id {} not found", event_id)))?;

        let Some(completion) =
            Self::find_completion_in_transaction(&mut tx, event_id, member_id, occurrence_date)
                .await?
        else {
            tx.commit().await?;
            return Ok(());
        };

        sqlx::query("DELETE FROM task_completions WHERE id = $1")
            .bind(completion.id)
            .execute(&mut *tx)
            .await?;

        let amount = event.xp_points.unwrap_or(1);
        self.reward_service()
            .reclaim_food_reward(member_id, event_id, amount)
            .await
            .map_err(|err| CoreError::RewardReclaim(err.to_string()))?;

        tx.commit().await?;
        self.invalidate_family(event.family_id);
        tracing::info!(%event_id, %member_id, %occurrence_date, "unmarked task completion");
        Ok(())
    }

    async fn is_task_completed(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<bool, CoreError> {
        let (completed,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (
                SELECT 1 FROM task_completions WHERE event_id = $1 AND occurrence_date = $2
            )"#,
        )
        .bind(event_id)
        .bind(occurrence_date)
        .fetch_one(self.pool())
        .await?;
        Ok(completed)
    }

    async fn find_task_completions(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Vec<TaskCompletion>, CoreError> {
        let completions = sqlx::query_as(
            r#"SELECT * FROM task_completions
            WHERE event_id = $1 AND occurrence_date = $2
            ORDER BY completed_at"#,
        )
        .bind(event_id)
        .bind(occurrence_date)
        .fetch_all(self.pool())
        .await?;
        Ok(completions)
    }
}

impl SqliteRepository {
    async fn find_completion_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_id: Uuid,
        member_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Option<TaskCompletion>, CoreError> {
        let completion = sqlx::query_as(
            r#"SELECT * FROM task_completions
            WHERE event_id = $1 AND member_id = $2 AND occurrence_date = $3"#,
        )
        .bind(event_id)
        .bind(member_id)
        .bind(occurrence_date)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(completion)
    }
}
