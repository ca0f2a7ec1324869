//! TOML file configuration structures.
//!
//! These structs directly map to the `verity-indexer.toml` file format.
//! Every field is optional; omitted values fall back to the defaults in
//! [`super::runtime`].

use serde::{Deserialize, Serialize};
use url::Url;
use verity_core::ledger::aptos::Network;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub poller: PollerConfig,
}

/// Ledger connection section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Address the `verity_vest` module is published under.
    pub module_address: Option<String>,
    pub network: Option<Network>,
    /// Overrides the network's public indexer endpoint.
    pub indexer_url: Option<Url>,
    /// Maximum events fetched per stream per tick.
    pub batch_size: Option<u32>,
    pub fetch_timeout_ms: Option<u64>,
}

/// Poll scheduling section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    pub poll_interval_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}
