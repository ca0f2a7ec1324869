//! Validated runtime configuration.

use std::time::Duration;
use url::Url;
use verity_core::ledger::aptos::Network;
use verity_core::processors::StreamSettings;
use verity_core::utils::backoff::PollSchedule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    pub ledger: LedgerConfig,
    pub schedule: PollSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Lowercase, `0x`-prefixed module address.
    pub module_address: String,
    pub network: Network,
    pub indexer_url: Url,
    pub batch_size: u32,
    pub fetch_timeout: Duration,
}

impl LedgerConfig {
    pub const DEFAULT_BATCH_SIZE: u32 = StreamSettings::DEFAULT_BATCH_SIZE;
    pub const MAX_BATCH_SIZE: u32 = StreamSettings::MAX_BATCH_SIZE;
    pub const DEFAULT_FETCH_TIMEOUT: Duration = StreamSettings::DEFAULT_FETCH_TIMEOUT;
}
