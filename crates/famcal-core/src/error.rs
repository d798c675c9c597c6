use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EditScope, RecurringType};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "Requested range of {requested_days} days exceeds the {limit_days}-day limit for {recurring_type} recurring events"
    )]
    RangeTooLarge {
        recurring_type: RecurringType,
        limit_days: i64,
        requested_days: i64,
    },

    #[error("Scope {0} requires a recurrence pattern in the request")]
    ScopeRequiresRecurrence(EditScope),

    #[error("{date} is not an occurrence of event {event_id}")]
    OccurrenceNotOnPattern { event_id: Uuid, date: NaiveDate },

    #[error("Cannot undo completion: {0}")]
    RewardReclaim(String),

    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),
}

impl CoreError {
    /// Errors caused by the caller's arguments. These are surfaced as-is and
    /// never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound(_)
                | CoreError::InvalidInput(_)
                | CoreError::RangeTooLarge { .. }
                | CoreError::ScopeRequiresRecurrence(_)
                | CoreError::OccurrenceNotOnPattern { .. }
                | CoreError::RewardReclaim(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_too_large_message_names_limit_and_type() {
        let err = CoreError::RangeTooLarge {
            recurring_type: RecurringType::Daily,
            limit_days: 365,
            requested_days: 400,
        };
        assert_eq!(
            err.to_string(),
            "Requested range of 400 days exceeds the 365-day limit for DAILY recurring events"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn conflicts_are_not_validation_errors() {
        assert!(!CoreError::ConcurrencyConflict("x".to_string()).is_validation());
    }
}
