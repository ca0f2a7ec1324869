//! Event handlers, one per event stream.
//!
//! A handler decodes the payload of a [`LedgerEvent`] and turns it into
//! exactly one idempotent write against the [`DomainStore`]. Fields the
//! ledger does not carry are synthesized from the [`ApplyContext`] and only
//! ever written on create, so replays leave them unchanged.

pub mod grant_created;
pub mod milestone_submitted;
pub mod payload;
pub mod proposal_created;
pub mod verification_logged;

pub use grant_created::GrantCreatedHandler;
pub use milestone_submitted::MilestoneSubmittedHandler;
pub use payload::DecodeError;
pub use proposal_created::ProposalCreatedHandler;
pub use verification_logged::VerificationLoggedHandler;

use crate::events::EventKind;
use crate::ledger::LedgerEvent;
use crate::store::{DomainStore, StoreError};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload could not be decoded
    #[error("payload decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Domain store write failed
    #[error("domain store write failed: {0}")]
    Store(#[from] StoreError),
}

/// Per-tick inputs shared by every handler invocation.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext {
    /// Start of the tick. Anchors synthesized dates on newly created records.
    pub observed_at: time::OffsetDateTime,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply one event. Must be safe to call again with the same event.
    async fn apply(
        &self,
        store: &dyn DomainStore,
        event: &LedgerEvent,
        ctx: &ApplyContext,
    ) -> Result<(), HandlerError>;
}

/// The handler responsible for a stream.
pub fn handler_for(kind: EventKind) -> Box<dyn EventHandler> {
    match kind {
        EventKind::GrantCreated => Box::new(GrantCreatedHandler),
        EventKind::ProposalCreated => Box::new(ProposalCreatedHandler),
        EventKind::MilestoneSubmitted => Box::new(MilestoneSubmittedHandler),
        EventKind::VerificationLogged => Box::new(VerificationLoggedHandler),
    }
}

/// Ledger version as stored alongside created records, if it fits.
pub(crate) fn stored_tx_version(event: &LedgerEvent) -> Option<i64> {
    i64::try_from(event.version).ok()
}
