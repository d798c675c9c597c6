use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum RecurringType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurringType {
    /// Months added to the start date when a series is created without any end bound.
    pub fn default_horizon_months(self) -> u32 {
        match self {
            RecurringType::Daily => 12,
            RecurringType::Weekly => 24,
            RecurringType::Monthly => 36,
            RecurringType::Yearly => 120,
        }
    }

    /// End date given to a series that has neither an end date nor an end count.
    pub fn default_end_date(self, start: NaiveDate) -> Option<NaiveDate> {
        start.checked_add_months(Months::new(self.default_horizon_months()))
    }
}

impl std::fmt::Display for RecurringType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurringType::Daily => write!(f, "DAILY"),
            RecurringType::Weekly => write!(f, "WEEKLY"),
            RecurringType::Monthly => write!(f, "MONTHLY"),
            RecurringType::Yearly => write!(f, "YEARLY"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurring type: {0}")]
pub struct ParseRecurringTypeError(String);

impl FromStr for RecurringType {
    type Err = ParseRecurringTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RecurringType::Daily),
            "weekly" => Ok(RecurringType::Weekly),
            "monthly" => Ok(RecurringType::Monthly),
            "yearly" => Ok(RecurringType::Yearly),
            _ => Err(ParseRecurringTypeError(s.to_string())),
        }
    }
}

/// Recurrence pattern of a base event. An event without one is a single event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub recurring_type: RecurringType,
    /// Number of periods between occurrences, at least 1
    pub interval: u32,
    /// Last calendar date an occurrence may fall on (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Maximum number of occurrences in the whole series
    pub end_count: Option<u32>,
}

impl Recurrence {
    pub fn new(recurring_type: RecurringType) -> Self {
        Self {
            recurring_type,
            interval: 1,
            end_date: None,
            end_count: None,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn times(mut self, end_count: u32) -> Self {
        self.end_count = Some(end_count);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
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
    pub recurrence: Option<Recurrence>,
    pub is_task: bool,
    pub xp_points: Option<i32>,
    pub is_required: bool,
    pub participant_ids: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// The calendar date this event (or instance) occupies.
    pub fn occurrence_date(&self) -> NaiveDate {
        self.start_date_time.date()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end_date_time.map(|end| end - self.start_date_time)
    }

    /// Materializes one occurrence of this event. The copy keeps the base id so
    /// that it can be addressed as `(id, occurrence_date)`, and is never recurring.
    pub fn instance_at(&self, start: NaiveDateTime) -> Event {
        Event {
            start_date_time: start,
            end_date_time: self.duration().map(|duration| start + duration),
            recurrence: None,
            ..self.clone()
        }
    }
}

/// Editable fields of an event. Used for creation, plain updates (full
/// replacement) and scoped updates; family and creator are never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: Option<NaiveDateTime>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub is_task: bool,
    pub xp_points: Option<i32>,
    pub is_required: bool,
    pub participant_ids: Vec<Uuid>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start_date_time: NaiveDateTime) -> Self {
        Self {
            category_id: None,
            title: title.into(),
            description: None,
            start_date_time,
            end_date_time: None,
            is_all_day: false,
            location: None,
            recurrence: None,
            is_task: false,
            xp_points: None,
            is_required: false,
            participant_ids: Vec::new(),
        }
    }
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            category_id: event.category_id,
            title: event.title.clone(),
            description: event.description.clone(),
            start_date_time: event.start_date_time,
            end_date_time: event.end_date_time,
            is_all_day: event.is_all_day,
            location: event.location.clone(),
            recurrence: event.recurrence.clone(),
            is_task: event.is_task,
            xp_points: event.xp_points,
            is_required: event.is_required,
            participant_ids: event.participant_ids.iter().copied().collect(),
        }
    }
}

/// Override or exclusion of exactly one occurrence of a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EventException {
    pub id: Uuid,
    /// The recurring base event
    pub event_id: Uuid,
    pub occurrence_date: NaiveDate,
    /// Standalone replacement event; `None` means the occurrence is excluded
    pub modified_event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EventException {
    pub fn is_exclusion(&self) -> bool {
        self.modified_event_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewEventException {
    pub event_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub modified_event_id: Option<Uuid>,
}

/// Outcome of inserting an exception guarded by the `(event_id, occurrence_date)`
/// uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionInsert {
    Inserted(EventException),
    /// Another writer created the row first; this is the row it wrote.
    AlreadyExists(EventException),
}

impl ExceptionInsert {
    pub fn was_inserted(&self) -> bool {
        matches!(self, ExceptionInsert::Inserted(_))
    }

    pub fn into_exception(self) -> EventException {
        match self {
            ExceptionInsert::Inserted(exception) | ExceptionInsert::AlreadyExists(exception) => {
                exception
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TaskCompletion {
    pub id: Uuid,
    pub event_id: Uuid,
    pub member_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub family_id: Uuid,
    pub name: String,
}

/// Blast radius of an edit or delete on a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditScope {
    /// Only the selected occurrence
    This,
    /// The selected occurrence and every later one
    ThisAndFollowing,
    /// The whole series
    All,
}

impl std::fmt::Display for EditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditScope::This => write!(f, "THIS"),
            EditScope::ThisAndFollowing => write!(f, "THIS_AND_FOLLOWING"),
            EditScope::All => write!(f, "ALL"),
        }
    }
}

impl FromStr for EditScope {
    type Err = ParseEditScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "this" | "occurrence" => Ok(EditScope::This),
            "this_and_following" | "following" | "future" => Ok(EditScope::ThisAndFollowing),
            "all" | "series" => Ok(EditScope::All),
            _ => Err(ParseEditScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid edit scope: {0}")]
pub struct ParseEditScopeError(String);

/// How an entry of a range query came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    /// A non-recurring event
    Single,
    /// Generated from a recurring base event
    Instance,
    /// Standalone replacement of one occurrence
    Override,
    /// The unmodified base event itself
    SeriesAnchor,
}

impl OccurrenceKind {
    /// Precedence when two entries of one series land on the same date.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            OccurrenceKind::Override => 3,
            OccurrenceKind::Instance => 2,
            OccurrenceKind::SeriesAnchor => 1,
            OccurrenceKind::Single => 0,
        }
    }
}

/// One entry of a calendar range query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event: Event,
    pub kind: OccurrenceKind,
    /// Recurring base event this entry belongs to
    pub series_id: Option<Uuid>,
    /// Date used to address this occurrence in scoped edits and completions
    pub occurrence_date: NaiveDate,
    /// Whether any member completed this occurrence (tasks only)
    pub completed: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Limits applied by the occurrence generator and the range assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceConfig {
    /// Safety bound on stepping while generating instances
    pub generation_iteration_cap: usize,
    /// Safety bound on stepping while validating an occurrence date
    pub validation_iteration_cap: usize,
    pub range_limits: RangeLimits,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            generation_iteration_cap: 1000,
            validation_iteration_cap: 10000,
            range_limits: RangeLimits::default(),
        }
    }
}

/// Longest range, in days, that may be expanded per recurring type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeLimits {
    pub daily_days: i64,
    pub weekly_days: i64,
    pub monthly_days: i64,
    pub yearly_days: i64,
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self {
            daily_days: 365,
            weekly_days: 730,
            monthly_days: 1095,
            yearly_days: 3650,
        }
    }
}

impl RangeLimits {
    pub fn limit_for(&self, recurring_type: RecurringType) -> i64 {
        match recurring_type {
            RecurringType::Daily => self.daily_days,
            RecurringType::Weekly => self.weekly_days,
            RecurringType::Monthly => self.monthly_days,
            RecurringType::Yearly => self.yearly_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(RecurringType::Daily, date(2025, 1, 1))]
    #[case(RecurringType::Weekly, date(2026, 1, 1))]
    #[case(RecurringType::Monthly, date(2027, 1, 1))]
    #[case(RecurringType::Yearly, date(2034, 1, 1))]
    fn default_end_date_follows_type_horizon(#[case] kind: RecurringType, #[case] expected: NaiveDate) {
        assert_eq!(kind.default_end_date(date(2024, 1, 1)), Some(expected));
    }

    #[test]
    fn default_end_date_clamps_leap_day() {
        assert_eq!(
            RecurringType::Daily.default_end_date(date(2024, 2, 29)),
            Some(date(2025, 2, 28))
        );
    }

    #[rstest]
    #[case("this", EditScope::This)]
    #[case("THIS_AND_FOLLOWING", EditScope::ThisAndFollowing)]
    #[case("following", EditScope::ThisAndFollowing)]
    #[case("all", EditScope::All)]
    fn edit_scope_parses(#[case] input: &str, #[case] expected: EditScope) {
        assert_eq!(input.parse::<EditScope>(), Ok(expected));
    }

    #[test]
    fn edit_scope_rejects_unknown() {
        assert!("sometimes".parse::<EditScope>().is_err());
    }

    #[test]
    fn recurring_type_round_trips_through_display() {
        for kind in [
            RecurringType::Daily,
            RecurringType::Weekly,
            RecurringType::Monthly,
            RecurringType::Yearly,
        ] {
            assert_eq!(kind.to_string().parse::<RecurringType>(), Ok(kind));
        }
    }

    #[test]
    fn instance_preserves_duration_and_drops_recurrence() {
        let start = date(2024, 1, 1).and_hms_opt(9, 0, 0).unwrap();
        let base = Event {
            id: Uuid::now_v7(),
            family_id: Uuid::now_v7(),
            category_id: None,
            title: "Piano".to_string(),
            description: None,
            start_date_time: start,
            end_date_time: Some(start + Duration::minutes(45)),
            is_all_day: false,
            location: None,
            created_by_id: Uuid::now_v7(),
            recurrence: Some(Recurrence::new(RecurringType::Weekly)),
            is_task: false,
            xp_points: None,
            is_required: false,
            participant_ids: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let next = date(2024, 1, 8).and_hms_opt(9, 0, 0).unwrap();
        let instance = base.instance_at(next);
        assert_eq!(instance.id, base.id);
        assert_eq!(instance.end_date_time, Some(next + Duration::minutes(45)));
        assert!(!instance.is_recurring());
    }
}
