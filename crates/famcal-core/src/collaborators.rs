//! Services the calendar engine talks to but does not own.
//!
//! The repository only needs to know whether a member exists and which family
//! they belong to, how to grant and take back the food reward attached to a
//! task, and whom to tell that a family's calendar changed. Each concern is a
//! trait so that the hosting application can plug in its own implementation.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::Member;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("Member {member_id} cannot give back {amount} food")]
    InsufficientBalance { member_id: Uuid, amount: i32 },

    #[error("Reward service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, CoreError>;
}

#[async_trait]
pub trait RewardService: Send + Sync {
    async fn grant_food_reward(
        &self,
        member_id: Uuid,
        event_id: Uuid,
        amount: i32,
    ) -> Result<(), RewardError>;

    async fn reclaim_food_reward(
        &self,
        member_id: Uuid,
        event_id: Uuid,
        amount: i32,
    ) -> Result<(), RewardError>;
}

/// Receives a notification after every committed calendar write.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_family(&self, family_id: Uuid);
}

/// Reward service for deployments without a food economy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRewards;

#[async_trait]
impl RewardService for NoRewards {
    async fn grant_food_reward(&self, _: Uuid, _: Uuid, _: i32) -> Result<(), RewardError> {
        Ok(())
    }

    async fn reclaim_food_reward(&self, _: Uuid, _: Uuid, _: i32) -> Result<(), RewardError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CacheInvalidator for NoCache {
    fn invalidate_family(&self, family_id: Uuid) {
        tracing::trace!(%family_id, "no cache to invalidate");
    }
}
