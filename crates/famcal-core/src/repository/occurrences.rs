use crate::error::CoreError;
use crate::models::{Event, EventException, OccurrenceKind, ScheduledEvent};
use crate::repository::query_builder::SqlQueryBuilder;
use crate::repository::{EventRow, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

#[async_trait]
impl super::OccurrenceRepository for SqliteRepository {
    /// Builds the family calendar for `[range_start, range_end]`.
    ///
    /// # Behavior
    ///
    /// - Single events overlapping the range are returned as they are, unless
    ///   they replace an occurrence of a series.
    /// - Recurring events are expanded, minus every date that has an exception.
    /// - Replacement events are returned when their own start is in range, even
    ///   when their series has no occurrence in it.
    /// - When two entries of one series share a date, a replacement wins over a
    ///   generated instance, which wins over the bare series event.
    ///
    /// Entries are sorted by start time. The whole read runs in one transaction.
    async fn occurrences_in_range(
        &self,
        family_id: Uuid,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<ScheduledEvent>, CoreError> {
        if range_end < range_start {
            return Err(CoreError::InvalidInput(format!(
                "Range end {} is before range start {}",
                range_end, range_start
            )));
        }

        let mut tx = self.pool().begin().await?;

        let single_rows: Vec<EventRow> = sqlx::query_as(
            r#"SELECT * FROM events e
            WHERE e.family_id = $1
              AND e.recurring_type IS NULL
              AND e.start_date_time <= $2
              AND COALESCE(e.end_date_time, e.start_date_time) >= $3
              AND NOT EXISTS (
                  SELECT 1 FROM event_exceptions x WHERE x.modified_event_id = e.id
              )
            ORDER BY e.start_date_time"#,
        )
        .bind(family_id)
        .bind(range_end)
        .bind(range_start)
        .fetch_all(&mut *tx)
        .await?;

        let series_rows: Vec<EventRow> = sqlx::query_as(
            r#"SELECT * FROM events
            WHERE family_id = $1
              AND recurring_type IS NOT NULL
              AND start_date_time <= $2
              AND (recurring_end_date IS NULL OR recurring_end_date >= $3)
            ORDER BY start_date_time"#,
        )
        .bind(family_id)
        .bind(range_end)
        .bind(range_start.date())
        .fetch_all(&mut *tx)
        .await?;

        let singles = Self::attach_participants_in_transaction(&mut tx, single_rows).await?;
        let series = Self::attach_participants_in_transaction(&mut tx, series_rows).await?;

        for base in &series {
            if let Some(recurrence) = &base.recurrence {
                self.generator()
                    .check_range(recurrence.recurring_type, range_start, range_end)?;
            }
        }

        let series_ids: Vec<Uuid> = series.iter().map(|event| event.id).collect();
        let mut exceptions =
            Self::find_exceptions_for_events_in_transaction(&mut tx, &series_ids).await?;

        // Overrides whose replacement starts in range, wherever their series falls.
        let known: HashSet<Uuid> = exceptions.iter().map(|exception| exception.id).collect();
        let moved_in = Self::find_overrides_starting_in_range_in_transaction(
            &mut tx,
            family_id,
            range_start,
            range_end,
        )
        .await?;
        exceptions.extend(
            moved_in
                .into_iter()
                .filter(|exception| !known.contains(&exception.id)),
        );

        let modified_ids: Vec<Uuid> = exceptions
            .iter()
            .filter_map(|exception| exception.modified_event_id)
            .collect();
        let modified_events: HashMap<Uuid, Event> =
            Self::find_events_by_ids_in_transaction(&mut tx, &modified_ids)
                .await?
                .into_iter()
                .map(|event| (event.id, event))
                .collect();

        let mut exceptions_by_event: HashMap<Uuid, Vec<EventException>> = HashMap::new();
        for exception in exceptions {
            exceptions_by_event
                .entry(exception.event_id)
                .or_default()
                .push(exception);
        }

        let mut entries: Vec<ScheduledEvent> = singles
            .into_iter()
            .map(|event| ScheduledEvent {
                occurrence_date: event.occurrence_date(),
                kind: OccurrenceKind::Single,
                series_id: None,
                completed: false,
                event,
            })
            .collect();

        for base in series {
            let series_exceptions = exceptions_by_event.remove(&base.id).unwrap_or_default();
            let excluded: HashSet<NaiveDate> = series_exceptions
                .iter()
                .map(|exception| exception.occurrence_date)
                .collect();

            let mut by_date: BTreeMap<NaiveDate, ScheduledEvent> = BTreeMap::new();

            let instances = self
                .generator()
                .generate(&base, range_start, range_end, &excluded);
            for instance in instances {
                insert_by_precedence(
                    &mut by_date,
                    ScheduledEvent {
                        occurrence_date: instance.occurrence_date(),
                        kind: OccurrenceKind::Instance,
                        series_id: Some(base.id),
                        completed: false,
                        event: instance,
                    },
                );
            }

            for exception in &series_exceptions {
                if let Some(entry) =
                    override_entry(exception, &modified_events, range_start, range_end)
                {
                    insert_by_precedence(&mut by_date, entry);
                }
            }

            let anchor_date = base.occurrence_date();
            let anchor_in_range =
                base.start_date_time >= range_start && base.start_date_time <= range_end;
            let has_instance_on_anchor = by_date
                .get(&anchor_date)
                .is_some_and(|entry| entry.kind == OccurrenceKind::Instance);
            if anchor_in_range && !excluded.contains(&anchor_date) && !has_instance_on_anchor {
                insert_by_precedence(
                    &mut by_date,
                    ScheduledEvent {
                        occurrence_date: anchor_date,
                        kind: OccurrenceKind::SeriesAnchor,
                        series_id: Some(base.id),
                        completed: false,
                        event: base,
                    },
                );
            }

            entries.extend(by_date.into_values());
        }

        // Series outside the range only contribute overrides moved into it.
        for exception in exceptions_by_event.into_values().flatten() {
            if let Some(entry) = override_entry(&exception, &modified_events, range_start, range_end)
            {
                entries.push(entry);
            }
        }

        let completed = Self::find_completed_occurrences_in_transaction(&mut tx, &entries).await?;
        for entry in entries.iter_mut() {
            entry.completed = entry.event.is_task
                && completed.contains(&(entry.event.id, entry.event.occurrence_date()));
        }

        entries.sort_by_key(|entry| entry.event.start_date_time);
        tx.commit().await?;

        tracing::debug!(
            %family_id,
            %range_start,
            %range_end,
            entries = entries.len(),
            "assembled calendar range"
        );
        Ok(entries)
    }
}

/// Keeps the entry with the higher precedence when a series has two entries
/// on the same date.
fn insert_by_precedence(by_date: &mut BTreeMap<NaiveDate, ScheduledEvent>, entry: ScheduledEvent) {
    match by_date.get(&entry.occurrence_date) {
        Some(existing) if existing.kind.precedence() >= entry.kind.precedence() => {}
        _ => {
            by_date.insert(entry.occurrence_date, entry);
        }
    }
}

/// Entry for the event replacing `exception`'s occurrence, if it starts in
/// the range.
fn override_entry(
    exception: &EventException,
    modified_events: &HashMap<Uuid, Event>,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
) -> Option<ScheduledEvent> {
    let modified = modified_events.get(&exception.modified_event_id?)?;
    if modified.start_date_time < range_start || modified.start_date_time > range_end {
        return None;
    }
    Some(ScheduledEvent {
        event: modified.clone(),
        kind: OccurrenceKind::Override,
        series_id: Some(exception.event_id),
        occurrence_date: exception.occurrence_date,
        completed: false,
    })
}

impl SqliteRepository {
    /// Exceptions of the family whose replacement event starts in the range,
    /// whatever the dates of their series.
    async fn find_overrides_starting_in_range_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        family_id: Uuid,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<EventException>, CoreError> {
        let exceptions = sqlx::query_as(
            r#"SELECT x.* FROM event_exceptions x
            JOIN events e ON e.id = x.modified_event_id
            WHERE e.family_id = $1
              AND e.start_date_time >= $2
              AND e.start_date_time <= $3
            ORDER BY x.occurrence_date"#,
        )
        .bind(family_id)
        .bind(range_start)
        .bind(range_end)
        .fetch_all(&mut **tx)
        .await?;
        Ok(exceptions)
    }

    /// `(event_id, occurrence_date)` pairs of task entries completed by anyone.
    async fn find_completed_occurrences_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        entries: &[ScheduledEvent],
    ) -> Result<HashSet<(Uuid, NaiveDate)>, CoreError> {
        let tasks: Vec<&Event> = entries
            .iter()
            .filter(|entry| entry.event.is_task)
            .map(|entry| &entry.event)
            .collect();
        let (Some(from), Some(to)) = (
            tasks.iter().map(|event| event.occurrence_date()).min(),
            tasks.iter().map(|event| event.occurrence_date()).max(),
        ) else {
            return Ok(HashSet::new());
        };
        let task_ids: Vec<Uuid> = tasks
            .iter()
            .map(|event| event.id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT event_id, occurrence_date FROM task_completions WHERE ",
        );
        SqlQueryBuilder::push_id_list(&mut qb, "event_id", &task_ids);
        qb.push(" AND occurrence_date >= ");
        qb.push_bind(from);
        qb.push(" AND occurrence_date <= ");
        qb.push_bind(to);

        let rows: Vec<(Uuid, NaiveDate)> = qb.build_query_as().fetch_all(&mut **tx).await?;
        Ok(rows.into_iter().collect())
    }
}
