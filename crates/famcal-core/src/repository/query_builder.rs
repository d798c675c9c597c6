use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

/// Utility functions shared by the batched lookups
pub struct SqlQueryBuilder;

impl SqlQueryBuilder {
    /// Pushes `column IN ($1, $2, ...)` binding every id.
    pub fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[Uuid]) {
        qb.push(column);
        qb.push(" IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
    }
}
