use super::payload::{DecodeError, Payload};
use super::{ApplyContext, EventHandler, HandlerError};
use crate::entities::MilestoneStatus;
use crate::entities::milestone::{Milestone, MilestoneChanges, NewMilestone, UpsertMilestone};
use crate::ledger::LedgerEvent;
use crate::store::DomainStore;
use async_trait::async_trait;
use tracing::debug;

/// Due date of an indexed milestone, counted from when it was first observed.
pub const DEFAULT_DUE_IN: time::Duration = time::Duration::days(7);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneSubmitted {
    pub proposal_id: String,
    pub milestone_index: i64,
    pub evidence: String,
}

impl MilestoneSubmitted {
    pub fn decode(data: &serde_json::Value) -> Result<Self, DecodeError> {
        let payload = Payload::new(data)?;
        Ok(Self {
            proposal_id: payload.id("proposal_id")?,
            milestone_index: payload.i64("milestone_index")?,
            evidence: payload.optional_text("evidence")?,
        })
    }
}

pub struct MilestoneSubmittedHandler;

#[async_trait]
impl EventHandler for MilestoneSubmittedHandler {
    async fn apply(
        &self,
        store: &dyn DomainStore,
        event: &LedgerEvent,
        ctx: &ApplyContext,
    ) -> Result<(), HandlerError> {
        let submitted = MilestoneSubmitted::decode(&event.data)?;
        let id = Milestone::key(&submitted.proposal_id, submitted.milestone_index);
        debug!(milestone_id = %id, version = event.version, "Upserting milestone");

        store
            .upsert_milestone(UpsertMilestone {
                milestone: NewMilestone {
                    id,
                    proposal_id: submitted.proposal_id,
                    milestone_index: submitted.milestone_index,
                    title: format!("Milestone #{}", submitted.milestone_index.saturating_add(1)),
                    description: submitted.evidence.clone(),
                    due_date: ctx.observed_at + DEFAULT_DUE_IN,
                    status: MilestoneStatus::Submitted,
                },
                changes: MilestoneChanges {
                    description: Some(submitted.evidence),
                    status: Some(MilestoneStatus::Submitted),
                },
            })
            .await?;
        Ok(())
    }
}
