use super::payload::{DecodeError, Payload};
use super::{ApplyContext, EventHandler, HandlerError};
use crate::entities::MilestoneStatus;
use crate::entities::milestone::SetProposalMilestonesStatus;
use crate::ledger::LedgerEvent;
use crate::store::DomainStore;
use async_trait::async_trait;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationLogged {
    pub proposal_id: String,
    pub approved: bool,
}

impl VerificationLogged {
    pub fn decode(data: &serde_json::Value) -> Result<Self, DecodeError> {
        let payload = Payload::new(data)?;
        Ok(Self {
            proposal_id: payload.id("proposal_id")?,
            approved: payload.bool("approved")?,
        })
    }
}

/// Applies a verifier decision to every milestone of the proposal.
pub struct VerificationLoggedHandler;

#[async_trait]
impl EventHandler for VerificationLoggedHandler {
    async fn apply(
        &self,
        store: &dyn DomainStore,
        event: &LedgerEvent,
        _ctx: &ApplyContext,
    ) -> Result<(), HandlerError> {
        let logged = VerificationLogged::decode(&event.data)?;
        let status = MilestoneStatus::from_verdict(logged.approved);

        let updated = store
            .set_proposal_milestones_status(SetProposalMilestonesStatus {
                proposal_id: logged.proposal_id.clone(),
                status,
            })
            .await?;

        if updated == 0 {
            warn!(
                proposal_id = %logged.proposal_id,
                version = event.version,
                "Verification matched no indexed milestones"
            );
        } else {
            debug!(
                proposal_id = %logged.proposal_id,
                ?status,
                updated,
                "Updated milestone statuses"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::MilestoneSubmittedHandler;
    use crate::ledger::scripted::{event, hex_text};
    use crate::store::memory::MemoryDomainStore;
    use serde_json::json;

    fn ctx() -> ApplyContext {
        ApplyContext {
            observed_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    async fn seed(store: &MemoryDomainStore, proposal_id: &str, index: u64) {
        let submitted = event(
            "0x1::verity_vest::MilestoneSubmittedEvent",
            index + 1,
            json!({
                "proposal_id": proposal_id,
                "milestone_index": index,
                "evidence": hex_text("proof"),
            }),
        );
        MilestoneSubmittedHandler
            .apply(store, &submitted, &ctx())
            .await
            .unwrap();
    }

    fn verdict(proposal_id: &str, approved: bool) -> LedgerEvent {
        event(
            "0x1::verity_vest::VerificationLoggedEvent",
            100,
            json!({ "proposal_id": proposal_id, "approved": approved }),
        )
    }

    #[tokio::test]
    async fn test_marks_all_milestones_of_proposal() {
        let store = MemoryDomainStore::new();
        seed(&store, "0xp1", 0).await;
        seed(&store, "0xp1", 1).await;
        seed(&store, "0xp2", 0).await;

        VerificationLoggedHandler
            .apply(&store, &verdict("0xp1", true), &ctx())
            .await
            .unwrap();

        assert_eq!(
            store.milestone("0xp1#0").await.unwrap().status,
            MilestoneStatus::Verified
        );
        assert_eq!(
            store.milestone("0xp1#1").await.unwrap().status,
            MilestoneStatus::Verified
        );
        assert_eq!(
            store.milestone("0xp2#0").await.unwrap().status,
            MilestoneStatus::Submitted
        );
    }

    #[tokio::test]
    async fn test_rejection_and_unknown_proposal() {
        let store = MemoryDomainStore::new();
        seed(&store, "0xp1", 0).await;

        VerificationLoggedHandler
            .apply(&store, &verdict("0xp1", false), &ctx())
            .await
            .unwrap();
        assert_eq!(
            store.milestone("0xp1#0").await.unwrap().status,
            MilestoneStatus::Rejected
        );

        // No milestones indexed yet: a no-op, not an error
        VerificationLoggedHandler
            .apply(&store, &verdict("0xunknown", true), &ctx())
            .await
            .unwrap();
    }
}
