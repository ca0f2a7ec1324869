use super::payload::{DecodeError, Payload};
use super::{ApplyContext, EventHandler, HandlerError, stored_tx_version};
use crate::entities::GrantStatus;
use crate::entities::grant::{GrantChanges, NewGrant, UpsertGrant};
use crate::ledger::LedgerEvent;
use crate::store::DomainStore;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

/// Deadline of an indexed grant, counted from when it was first observed.
pub const DEFAULT_DEADLINE: time::Duration = time::Duration::days(30);
pub const DEFAULT_DESCRIPTION: &str = "On-chain created";
pub const DEFAULT_CATEGORY: &str = "General";
/// Donor id used for records that originate on chain.
pub const ONCHAIN_DONOR_ID: &str = "onchain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantCreated {
    pub grant_id: String,
    pub title: String,
    pub amount: Decimal,
    pub milestones: i64,
    pub donor: String,
}

impl GrantCreated {
    pub fn decode(data: &serde_json::Value) -> Result<Self, DecodeError> {
        let payload = Payload::new(data)?;
        Ok(Self {
            grant_id: payload.id("grant_id")?,
            title: payload.text("title")?,
            amount: payload.amount("amount")?,
            milestones: payload.i64("milestones")?,
            donor: payload.address("donor")?,
        })
    }
}

pub struct GrantCreatedHandler;

#[async_trait]
impl EventHandler for GrantCreatedHandler {
    async fn apply(
        &self,
        store: &dyn DomainStore,
        event: &LedgerEvent,
        ctx: &ApplyContext,
    ) -> Result<(), HandlerError> {
        let created = GrantCreated::decode(&event.data)?;
        debug!(grant_id = %created.grant_id, version = event.version, "Upserting grant");

        store
            .upsert_grant(UpsertGrant {
                grant: NewGrant {
                    id: created.grant_id,
                    title: created.title.clone(),
                    description: DEFAULT_DESCRIPTION.to_string(),
                    amount: created.amount,
                    category: DEFAULT_CATEGORY.to_string(),
                    deadline: ctx.observed_at + DEFAULT_DEADLINE,
                    status: GrantStatus::Open,
                    donor_id: ONCHAIN_DONOR_ID.to_string(),
                    donor_name: created.donor,
                    milestones_count: created.milestones,
                    tx_version: stored_tx_version(event),
                },
                changes: GrantChanges {
                    title: Some(created.title),
                    amount: Some(created.amount),
                },
            })
            .await?;
        Ok(())
    }
}
