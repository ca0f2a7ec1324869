use super::payload::{DecodeError, Payload};
use super::{ApplyContext, EventHandler, HandlerError, stored_tx_version};
use crate::entities::ProposalStatus;
use crate::entities::proposal::{NewProposal, ProposalChanges, UpsertProposal};
use crate::ledger::LedgerEvent;
use crate::store::DomainStore;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

pub const DEFAULT_TITLE: &str = "On-chain Proposal";
pub const ONCHAIN_APPLICANT_ID: &str = "onchain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalCreated {
    pub proposal_id: String,
    pub grant_id: String,
    pub applicant: String,
    pub requested_amount: Decimal,
    pub metadata: String,
}

impl ProposalCreated {
    pub fn decode(data: &serde_json::Value) -> Result<Self, DecodeError> {
        let payload = Payload::new(data)?;
        Ok(Self {
            proposal_id: payload.id("proposal_id")?,
            grant_id: payload.id("grant_id")?,
            applicant: payload.address("applicant")?,
            requested_amount: payload.amount("requested_amount")?,
            metadata: payload.optional_text("metadata_uri")?,
        })
    }
}

pub struct ProposalCreatedHandler;

#[async_trait]
impl EventHandler for ProposalCreatedHandler {
    async fn apply(
        &self,
        store: &dyn DomainStore,
        event: &LedgerEvent,
        ctx: &ApplyContext,
    ) -> Result<(), HandlerError> {
        let created = ProposalCreated::decode(&event.data)?;
        debug!(
            proposal_id = %created.proposal_id,
            grant_id = %created.grant_id,
            version = event.version,
            "Upserting proposal"
        );

        store
            .upsert_proposal(UpsertProposal {
                proposal: NewProposal {
                    id: created.proposal_id,
                    grant_id: created.grant_id,
                    applicant_id: ONCHAIN_APPLICANT_ID.to_string(),
                    applicant_name: created.applicant,
                    title: DEFAULT_TITLE.to_string(),
                    description: created.metadata,
                    requested_amount: created.requested_amount,
                    status: ProposalStatus::Pending,
                    submitted_at: ctx.observed_at,
                    tx_version: stored_tx_version(event),
                },
                changes: ProposalChanges {
                    requested_amount: Some(created.requested_amount),
                },
            })
            .await?;
        Ok(())
    }
}
