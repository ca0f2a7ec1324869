//! Ledger client seam.
//!
//! The indexer assumes nothing about the returned batches beyond "eventually
//! delivers events at or above any version already seen": ordering,
//! deduplication and filtering against the cursor all happen in the poller.

pub mod aptos;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// A single event as emitted by the ledger. Immutable, read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    /// Ledger version of the transaction that emitted the event.
    pub version: u64,
    /// Position of the event within its transaction. A transaction may emit
    /// several events of the same type, so `(version, event_index)` is the
    /// identity of an event within a stream.
    pub event_index: u64,
    pub sequence_number: u64,
    pub event_type: String,
    /// Chain-specific payload, decoded by the event handlers.
    pub data: serde_json::Value,
}

/// Parameters of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub account: String,
    pub event_type: String,
    pub limit: u32,
    /// The stream cursor. Clients may use it to page forward; the poller
    /// re-filters regardless.
    pub after_version: u64,
}

/// Errors that can occur while fetching events. All are transient.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request error
    #[error("ledger request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The fetch exceeded its deadline
    #[error("ledger request timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger API returned an error
    #[error("ledger API error: {message}")]
    Api { message: String },

    /// Response body did not have the expected shape
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch at most `request.limit` events of one type for one account.
    ///
    /// A page that comes back full may end in the middle of a transaction.
    async fn fetch_events(&self, request: FetchRequest) -> Result<Vec<LedgerEvent>, FetchError>;
}
