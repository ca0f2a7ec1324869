//! In-memory stores with the same merge semantics as the Postgres ones.
//!
//! Used by the test suites and handy for dry runs against a live ledger.

use super::{CursorStore, DomainStore, StoreError};
use crate::entities::grant::{Grant, UpsertGrant};
use crate::entities::milestone::{Milestone, SetProposalMilestonesStatus, UpsertMilestone};
use crate::entities::proposal::{Proposal, UpsertProposal};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: RwLock<HashMap<String, u64>>,
    failing: RwLock<bool>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until called again with `false`.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, event_type: &str) -> Result<u64, StoreError> {
        Ok(self
            .cursors
            .read()
            .await
            .get(event_type)
            .copied()
            .unwrap_or(0))
    }

    async fn set(&self, event_type: &str, version: u64) -> Result<u64, StoreError> {
        if *self.failing.read().await {
            return Err(StoreError::Unavailable(format!(
                "cursor write for {event_type} rejected"
            )));
        }
        let mut cursors = self.cursors.write().await;
        let stored = cursors.entry(event_type.to_string()).or_insert(0);
        *stored = (*stored).max(version);
        Ok(*stored)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDomainStore {
    grants: RwLock<BTreeMap<String, Grant>>,
    proposals: RwLock<BTreeMap<String, Proposal>>,
    milestones: RwLock<BTreeMap<String, Milestone>>,
    /// Record ids whose writes are rejected.
    poisoned: RwLock<HashSet<String>>,
}

impl MemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes keyed by `id` until [`heal`](Self::heal) is called.
    pub async fn poison(&self, id: &str) {
        self.poisoned.write().await.insert(id.to_string());
    }

    pub async fn heal(&self, id: &str) {
        self.poisoned.write().await.remove(id);
    }

    pub async fn grant(&self, id: &str) -> Option<Grant> {
        self.grants.read().await.get(id).cloned()
    }

    pub async fn grants(&self) -> Vec<Grant> {
        self.grants.read().await.values().cloned().collect()
    }

    pub async fn proposal(&self, id: &str) -> Option<Proposal> {
        self.proposals.read().await.get(id).cloned()
    }

    pub async fn milestone(&self, id: &str) -> Option<Milestone> {
        self.milestones.read().await.get(id).cloned()
    }

    pub async fn milestones(&self) -> Vec<Milestone> {
        self.milestones.read().await.values().cloned().collect()
    }

    async fn check_writable(&self, id: &str) -> Result<(), StoreError> {
        if self.poisoned.read().await.contains(id) {
            return Err(StoreError::Unavailable(format!("write to {id} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn upsert_grant(&self, cmd: UpsertGrant) -> Result<(), StoreError> {
        self.check_writable(&cmd.grant.id).await?;
        let mut grants = self.grants.write().await;
        match grants.get_mut(&cmd.grant.id) {
            Some(existing) => cmd.changes.merge_into(existing),
            None => {
                grants.insert(cmd.grant.id.clone(), cmd.grant.into());
            }
        }
        Ok(())
    }

    async fn upsert_proposal(&self, cmd: UpsertProposal) -> Result<(), StoreError> {
        self.check_writable(&cmd.proposal.id).await?;
        let mut proposals = self.proposals.write().await;
        match proposals.get_mut(&cmd.proposal.id) {
            Some(existing) => cmd.changes.merge_into(existing),
            None => {
                proposals.insert(cmd.proposal.id.clone(), cmd.proposal.into());
            }
        }
        Ok(())
    }

    async fn upsert_milestone(&self, cmd: UpsertMilestone) -> Result<(), StoreError> {
        self.check_writable(&cmd.milestone.id).await?;
        let mut milestones = self.milestones.write().await;
        match milestones.get_mut(&cmd.milestone.id) {
            Some(existing) => cmd.changes.merge_into(existing),
            None => {
                milestones.insert(cmd.milestone.id.clone(), cmd.milestone.into());
            }
        }
        Ok(())
    }

    async fn set_proposal_milestones_status(
        &self,
        cmd: SetProposalMilestonesStatus,
    ) -> Result<u64, StoreError> {
        self.check_writable(&cmd.proposal_id).await?;
        let mut updated = 0;
        for milestone in self.milestones.write().await.values_mut() {
            if milestone.proposal_id == cmd.proposal_id {
                milestone.status = cmd.status;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::GrantStatus;
    use crate::entities::grant::{GrantChanges, NewGrant};
    use rust_decimal::Decimal;

    fn upsert(id: &str, title: &str, amount: u64) -> UpsertGrant {
        UpsertGrant {
            grant: NewGrant {
                id: id.to_string(),
                title: title.to_string(),
                description: "created".to_string(),
                amount: Decimal::from(amount),
                category: "General".to_string(),
                deadline: time::OffsetDateTime::UNIX_EPOCH,
                status: GrantStatus::Open,
                donor_id: "onchain".to_string(),
                donor_name: "0xdonor".to_string(),
                milestones_count: 2,
                tx_version: Some(1),
            },
            changes: GrantChanges {
                title: Some(title.to_string()),
                amount: None,
            },
        }
    }

    #[tokio::test]
    async fn test_cursor_never_regresses() {
        let store = MemoryCursorStore::new();
        assert_eq!(store.get("stream").await.unwrap(), 0);
        assert_eq!(store.set("stream", 9).await.unwrap(), 9);
        assert_eq!(store.set("stream", 4).await.unwrap(), 9);
        assert_eq!(store.get("stream").await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_failing_cursor_write_keeps_old_value() {
        let store = MemoryCursorStore::new();
        store.set("stream", 3).await.unwrap();
        store.set_failing(true).await;
        assert!(store.set("stream", 8).await.is_err());
        assert_eq!(store.get("stream").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_merges_only_listed_fields() {
        let store = MemoryDomainStore::new();
        store.upsert_grant(upsert("g1", "first", 100)).await.unwrap();
        store.upsert_grant(upsert("g1", "second", 999)).await.unwrap();

        let grant = store.grant("g1").await.unwrap();
        assert_eq!(grant.title, "second");
        // amount is not part of the change set, so the create value stays
        assert_eq!(grant.amount, Decimal::from(100));
        assert_eq!(grant.description, "created");
        assert_eq!(store.grants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_poisoned_id_rejects_writes() {
        let store = MemoryDomainStore::new();
        store.poison("g1").await;
        assert!(store.upsert_grant(upsert("g1", "t", 1)).await.is_err());
        store.heal("g1").await;
        assert!(store.upsert_grant(upsert("g1", "t", 1)).await.is_ok());
    }
}
