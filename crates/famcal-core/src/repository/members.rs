use crate::collaborators::MemberDirectory;
use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{Member, NewMember};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

/// Member directory over the local `members` table.
#[derive(Debug, Clone)]
pub struct SqliteMemberDirectory {
    pool: DbPool,
}

impl SqliteMemberDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberDirectory for SqliteMemberDirectory {
    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, CoreError> {
        let member = sqlx::query_as("SELECT * FROM members WHERE id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }
}

#[async_trait]
impl super::MemberRepository for SqliteRepository {
    async fn add_member(&self, member: NewMember) -> Result<Member, CoreError> {
        let name = member.name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidInput("Member name cannot be empty".to_string()));
        }

        let member: Member = sqlx::query_as(
            r#"INSERT INTO members (id, family_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *"#,
        )
        .bind(Uuid::now_v7())
        .bind(member.family_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        tracing::info!(member_id = %member.id, family_id = %member.family_id, "added member");
        Ok(member)
    }

    async fn find_member(&self, id: Uuid) -> Result<Option<Member>, CoreError> {
        self.member_directory().find_member(id).await
    }

    async fn find_members_by_family(&self, family_id: Uuid) -> Result<Vec<Member>, CoreError> {
        let members = sqlx::query_as("SELECT * FROM members WHERE family_id = $1 ORDER BY name")
            .bind(family_id)
            .fetch_all(self.pool())
            .await?;
        Ok(members)
    }
}
