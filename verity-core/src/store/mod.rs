//! Persistence seams of the indexer.
//!
//! The poller only talks to [`CursorStore`] and [`DomainStore`]. The
//! Postgres implementations live on [`DatabaseProcessor`](crate::framework::DatabaseProcessor)
//! and the in-memory ones in [`memory`].

pub mod memory;
mod postgres;

use crate::entities::grant::UpsertGrant;
use crate::entities::milestone::{SetProposalMilestonesStatus, UpsertMilestone};
use crate::entities::proposal::UpsertProposal;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by cursor or domain persistence. All of them are retryable.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Version does not fit the signed storage column
    #[error("version {0} exceeds the storable range")]
    VersionOutOfRange(u64),

    /// Stored cursor is negative, which the schema forbids
    #[error("stored cursor for {event_type} is negative: {value}")]
    CorruptCursor { event_type: String, value: i64 },

    /// Backend refused the write
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable map from event type to the last applied ledger version.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Last applied version of the stream, `0` if the stream was never advanced.
    async fn get(&self, event_type: &str) -> Result<u64, StoreError>;

    /// Advance the stream to `version`.
    ///
    /// A `version` below the stored value is ignored. Returns the stored
    /// value after the write.
    async fn set(&self, event_type: &str, version: u64) -> Result<u64, StoreError>;
}

/// Idempotent upsert contract shared by the indexer and the CRUD API.
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn upsert_grant(&self, cmd: UpsertGrant) -> Result<(), StoreError>;

    async fn upsert_proposal(&self, cmd: UpsertProposal) -> Result<(), StoreError>;

    async fn upsert_milestone(&self, cmd: UpsertMilestone) -> Result<(), StoreError>;

    /// Bulk status transition for all milestones of one proposal.
    ///
    /// Returns the number of milestones touched.
    async fn set_proposal_milestones_status(
        &self,
        cmd: SetProposalMilestonesStatus,
    ) -> Result<u64, StoreError>;
}
