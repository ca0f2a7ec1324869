use super::{CursorStore, DomainStore, StoreError};
use crate::entities::grant::UpsertGrant;
use crate::entities::indexer_cursor::{AdvanceIndexerCursor, GetIndexerCursor};
use crate::entities::milestone::{SetProposalMilestonesStatus, UpsertMilestone};
use crate::entities::proposal::UpsertProposal;
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;

fn stored_version(event_type: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::CorruptCursor {
        event_type: event_type.to_string(),
        value,
    })
}

#[async_trait]
impl CursorStore for DatabaseProcessor {
    async fn get(&self, event_type: &str) -> Result<u64, StoreError> {
        let last_version = self
            .process(GetIndexerCursor {
                event_type: event_type.to_string(),
            })
            .await?;
        match last_version {
            Some(value) => stored_version(event_type, value),
            None => Ok(0),
        }
    }

    async fn set(&self, event_type: &str, version: u64) -> Result<u64, StoreError> {
        let last_version =
            i64::try_from(version).map_err(|_| StoreError::VersionOutOfRange(version))?;
        let stored = self
            .process(AdvanceIndexerCursor {
                event_type: event_type.to_string(),
                last_version,
            })
            .await?;
        stored_version(event_type, stored)
    }
}

#[async_trait]
impl DomainStore for DatabaseProcessor {
    async fn upsert_grant(&self, cmd: UpsertGrant) -> Result<(), StoreError> {
        self.process(cmd).await?;
        Ok(())
    }

    async fn upsert_proposal(&self, cmd: UpsertProposal) -> Result<(), StoreError> {
        self.process(cmd).await?;
        Ok(())
    }

    async fn upsert_milestone(&self, cmd: UpsertMilestone) -> Result<(), StoreError> {
        self.process(cmd).await?;
        Ok(())
    }

    async fn set_proposal_milestones_status(
        &self,
        cmd: SetProposalMilestonesStatus,
    ) -> Result<u64, StoreError> {
        Ok(self.process(cmd).await?)
    }
}

// These run the real SQL against a live database; migrations are applied
// on connect. `DATABASE_URL=... cargo test -p verity-core -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::grant::{GrantChanges, NewGrant};
    use crate::entities::milestone::{MilestoneChanges, NewMilestone};
    use crate::entities::{GrantStatus, MilestoneStatus};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    async fn database() -> DatabaseProcessor {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("../migrations").run(&pool).await.unwrap();
        DatabaseProcessor::new(pool)
    }

    /// Keeps repeated runs against the same database apart.
    fn unique(prefix: &str) -> String {
        format!("{prefix}-{:016x}", rand::random::<u64>())
    }

    fn new_grant(id: &str, title: &str, amount: u64) -> NewGrant {
        NewGrant {
            id: id.to_string(),
            title: title.to_string(),
            description: "On-chain created".to_string(),
            amount: Decimal::from(amount),
            category: "General".to_string(),
            deadline: time::macros::datetime!(2025-02-01 00:00 UTC),
            status: GrantStatus::Open,
            donor_id: "onchain".to_string(),
            donor_name: "0xd0".to_string(),
            milestones_count: 2,
            tx_version: Some(5),
        }
    }

    fn new_milestone(proposal_id: &str) -> NewMilestone {
        NewMilestone {
            id: crate::entities::milestone::Milestone::key(proposal_id, 0),
            proposal_id: proposal_id.to_string(),
            milestone_index: 0,
            title: "Milestone #1".to_string(),
            description: "ipfs://a".to_string(),
            due_date: time::macros::datetime!(2025-02-08 00:00 UTC),
            status: MilestoneStatus::Submitted,
        }
    }

    #[tokio::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_cursor_never_regresses_in_postgres() {
        let db = database().await;
        let stream = unique("0x1::verity_vest::GrantCreatedEvent");

        assert_eq!(db.get(&stream).await.unwrap(), 0);
        assert_eq!(db.set(&stream, 10).await.unwrap(), 10);
        assert_eq!(db.set(&stream, 4).await.unwrap(), 10);
        assert_eq!(db.get(&stream).await.unwrap(), 10);
        assert_eq!(db.set(&stream, 11).await.unwrap(), 11);
    }

    #[tokio::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_grant_upsert_merges_listed_fields_only() {
        let db = database().await;
        let id = unique("0xgrant");

        db.upsert_grant(UpsertGrant {
            grant: new_grant(&id, "First", 1000),
            changes: GrantChanges::default(),
        })
        .await
        .unwrap();
        let mut replay = new_grant(&id, "Second", 2000);
        replay.description = "rewritten".to_string();
        db.upsert_grant(UpsertGrant {
            grant: replay,
            changes: GrantChanges {
                title: Some("Second".to_string()),
                amount: None,
            },
        })
        .await
        .unwrap();

        let (title, description, amount): (String, String, Decimal) =
            sqlx::query_as("SELECT title, description, amount FROM grants WHERE id = $1")
                .bind(&id)
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(title, "Second");
        assert_eq!(description, "On-chain created");
        assert_eq!(amount, Decimal::from(1000));
    }

    #[tokio::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_replayed_milestone_keeps_verdict_in_postgres() {
        let db = database().await;
        let proposal_id = unique("0xproposal");
        let submit = UpsertMilestone {
            milestone: new_milestone(&proposal_id),
            changes: MilestoneChanges {
                description: Some("ipfs://a".to_string()),
                status: Some(MilestoneStatus::Submitted),
            },
        };

        db.upsert_milestone(submit.clone()).await.unwrap();
        let updated = db
            .set_proposal_milestones_status(SetProposalMilestonesStatus {
                proposal_id: proposal_id.clone(),
                status: MilestoneStatus::Verified,
            })
            .await
            .unwrap();
        assert_eq!(updated, 1);
        db.upsert_milestone(submit).await.unwrap();

        let status: MilestoneStatus =
            sqlx::query_scalar("SELECT status FROM milestones WHERE proposal_id = $1")
                .bind(&proposal_id)
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(status, MilestoneStatus::Verified);

        let none = db
            .set_proposal_milestones_status(SetProposalMilestonesStatus {
                proposal_id: unique("0xmissing"),
                status: MilestoneStatus::Rejected,
            })
            .await
            .unwrap();
        assert_eq!(none, 0);
    }
}
