use crate::error::CoreError;
use crate::models::{EventException, ExceptionInsert, NewEventException};
use crate::repository::query_builder::SqlQueryBuilder;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[async_trait]
impl super::ExceptionRepository for SqliteRepository {
    async fn find_exception(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Option<EventException>, CoreError> {
        let mut tx = self.pool().begin().await?;
        let exception =
            Self::find_exception_in_transaction(&mut tx, event_id, occurrence_date).await?;
        tx.commit().await?;
        Ok(exception)
    }

    async fn find_exceptions_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<Vec<EventException>, CoreError> {
        let mut tx = self.pool().begin().await?;
        let exceptions = Self::find_exceptions_for_events_in_transaction(&mut tx, event_ids).await?;
        tx.commit().await?;
        Ok(exceptions)
    }

    async fn find_excluded_dates_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashSet<NaiveDate>>, CoreError> {
        let mut tx = self.pool().begin().await?;
        let excluded =
            Self::find_excluded_dates_for_events_in_transaction(&mut tx, event_ids).await?;
        tx.commit().await?;
        Ok(excluded)
    }

    async fn try_insert_exception(
        &self,
        exception: NewEventException,
    ) -> Result<ExceptionInsert, CoreError> {
        let mut tx = self.begin_write().await?;
        let outcome = Self::try_insert_exception_in_transaction(&mut tx, exception).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn remove_exception(
        &self,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<(), CoreError> {
        let mut tx = self.begin_write().await?;
        let exception = Self::find_exception_in_transaction(&mut tx, event_id, occurrence_date)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "Exception not found for event {} on {}",
                    event_id, occurrence_date
                ))
            })?;
        Self::remove_exception_in_transaction(&mut tx, &exception).await?;

        let family_id: Option<(Uuid,)> =
            sqlx::query_as("SELECT family_id FROM events WHERE id = $1")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;

        if let Some((family_id,)) = family_id {
            self.invalidate_family(family_id);
        }
        tracing::info!(%event_id, %occurrence_date, "reverted occurrence exception");
        Ok(())
    }
}

impl SqliteRepository {
    pub(crate) async fn find_exception_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Option<EventException>, CoreError> {
        let exception = sqlx::query_as(
            "SELECT * FROM event_exceptions WHERE event_id = $1 AND occurrence_date = $2",
        )
        .bind(event_id)
        .bind(occurrence_date)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(exception)
    }

    pub(crate) async fn find_exceptions_for_events_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_ids: &[Uuid],
    ) -> Result<Vec<EventException>, CoreError> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM event_exceptions WHERE ");
        SqlQueryBuilder::push_id_list(&mut qb, "event_id", event_ids);
        qb.push(" ORDER BY event_id, occurrence_date");

        let exceptions = qb.build_query_as().fetch_all(&mut **tx).await?;
        Ok(exceptions)
    }

    /// Every date with an exception, overridden or excluded, keyed by base event.
    pub(crate) async fn find_excluded_dates_for_events_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, HashSet<NaiveDate>>, CoreError> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT event_id, occurrence_date FROM event_exceptions WHERE ");
        SqlQueryBuilder::push_id_list(&mut qb, "event_id", event_ids);
        let rows: Vec<(Uuid, NaiveDate)> = qb.build_query_as().fetch_all(&mut **tx).await?;

        let mut excluded: HashMap<Uuid, HashSet<NaiveDate>> = HashMap::new();
        for (event_id, occurrence_date) in rows {
            excluded.entry(event_id).or_default().insert(occurrence_date);
        }
        Ok(excluded)
    }

    pub(crate) async fn find_excluded_dates_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_id: Uuid,
    ) -> Result<HashSet<NaiveDate>, CoreError> {
        let mut excluded = Self::find_excluded_dates_for_events_in_transaction(tx, &[event_id]).await?;
        Ok(excluded.remove(&event_id).unwrap_or_default())
    }

    /// Inserts the exception unless one already exists for the same
    /// `(event_id, occurrence_date)`, in which case the existing row is re-read
    /// once and returned as [`ExceptionInsert::AlreadyExists`].
    pub(crate) async fn try_insert_exception_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        exception: NewEventException,
    ) -> Result<ExceptionInsert, CoreError> {
        let created = EventException {
            id: Uuid::now_v7(),
            event_id: exception.event_id,
            occurrence_date: exception.occurrence_date,
            modified_event_id: exception.modified_event_id,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"INSERT INTO event_exceptions (id, event_id, occurrence_date, modified_event_id, created_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(created.id)
        .bind(created.event_id)
        .bind(created.occurrence_date)
        .bind(created.modified_event_id)
        .bind(created.created_at)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(ExceptionInsert::Inserted(created)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                tracing::debug!(
                    event_id = %created.event_id,
                    occurrence_date = %created.occurrence_date,
                    "exception already exists, re-reading"
                );
                match Self::find_exception_in_transaction(
                    tx,
                    created.event_id,
                    created.occurrence_date,
                )
                .await?
                {
                    Some(existing) => Ok(ExceptionInsert::AlreadyExists(existing)),
                    None => Err(CoreError::ConcurrencyConflict(format!(
                        "Exception for event {} on {} vanished after a conflicting insert",
                        created.event_id, created.occurrence_date
                    ))),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) async fn set_modified_event_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        exception_id: Uuid,
        modified_event_id: Option<Uuid>,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE event_exceptions SET modified_event_id = $1 WHERE id = $2")
            .bind(modified_event_id)
            .bind(exception_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Deletes the exception row and the standalone event it points to.
    pub(crate) async fn remove_exception_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        exception: &EventException,
    ) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM event_exceptions WHERE id = $1")
            .bind(exception.id)
            .execute(&mut **tx)
            .await?;

        if let Some(modified_event_id) = exception.modified_event_id {
            sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(modified_event_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Removes every exception of `event_id` on or after `from`, along with
    /// their standalone events. Returns the number of exceptions removed.
    pub(crate) async fn purge_exceptions_from_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        event_id: Uuid,
        from: NaiveDate,
    ) -> Result<u64, CoreError> {
        let modified: Vec<(Uuid,)> = sqlx::query_as(
            r#"SELECT modified_event_id FROM event_exceptions
            WHERE event_id = $1 AND occurrence_date >= $2 AND modified_event_id IS NOT NULL"#,
        )
        .bind(event_id)
        .bind(from)
        .fetch_all(&mut **tx)
        .await?;

        let result =
            sqlx::query("DELETE FROM event_exceptions WHERE event_id = $1 AND occurrence_date >= $2")
                .bind(event_id)
                .bind(from)
                .execute(&mut **tx)
                .await?;

        if !modified.is_empty() {
            let ids: Vec<Uuid> = modified.into_iter().map(|(id,)| id).collect();
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM events WHERE ");
            SqlQueryBuilder::push_id_list(&mut qb, "id", &ids);
            qb.build().execute(&mut **tx).await?;
        }

        Ok(result.rows_affected())
    }
}
