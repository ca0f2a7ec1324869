//! Configuration module for verity-indexer.
//!
//! Merges CLI arguments, environment variables and an optional TOML file
//! into a validated [`IndexerConfig`]. Precedence is CLI/env (resolved by
//! clap) over file over defaults.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{IndexerConfig, LedgerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use verity_core::ledger::aptos::Network;
use verity_core::utils::backoff::PollSchedule;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("missing module address: set MODULE_ADDRESS, --module-address or ledger.module_address")]
    MissingModuleAddress,

    #[error("invalid indexer URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub module_address: Option<String>,
    pub network: Option<Network>,
    pub poll_interval_ms: Option<u64>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    /// Whether the path was given explicitly; a missing default file is fine.
    explicit: bool,
    overrides: Overrides,
}

impl ConfigLoader {
    pub const DEFAULT_PATH: &'static str = "./verity-indexer.toml";

    /// Create a new config loader.
    pub fn new(config_path: Option<&Path>, overrides: Overrides) -> Self {
        match config_path {
            Some(path) => Self {
                config_path: path.to_path_buf(),
                explicit: true,
                overrides,
            },
            None => Self {
                config_path: PathBuf::from(Self::DEFAULT_PATH),
                explicit: false,
                overrides,
            },
        }
    }

    /// Load and validate the configuration.
    pub fn load(&self) -> Result<IndexerConfig, ConfigError> {
        let file_config = self.read_file()?;
        self.build(file_config)
    }

    fn read_file(&self) -> Result<FileConfig, ConfigError> {
        match std::fs::read_to_string(&self.config_path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.explicit => {
                tracing::debug!(path = ?self.config_path, "No config file, using defaults");
                Ok(FileConfig::default())
            }
            Err(source) => Err(ConfigError::IoError {
                path: self.config_path.clone(),
                source,
            }),
        }
    }

    fn build(&self, file_config: FileConfig) -> Result<IndexerConfig, ConfigError> {
        let FileConfig { ledger, poller } = file_config;

        let module_address = self
            .overrides
            .module_address
            .clone()
            .or(ledger.module_address)
            .filter(|address| !address.trim().is_empty())
            .ok_or(ConfigError::MissingModuleAddress)?;
        let module_address = validate_address(&module_address)?;

        let network = self.overrides.network.or(ledger.network).unwrap_or_default();
        let indexer_url = match ledger.indexer_url {
            Some(url) => url,
            None => Url::parse(network.indexer_url())?,
        };

        let batch_size = ledger.batch_size.unwrap_or(LedgerConfig::DEFAULT_BATCH_SIZE);
        if batch_size == 0 || batch_size > LedgerConfig::MAX_BATCH_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "ledger.batch_size must be between 1 and {}, got {batch_size}",
                LedgerConfig::MAX_BATCH_SIZE
            )));
        }

        let fetch_timeout = positive_millis(
            "ledger.fetch_timeout_ms",
            ledger.fetch_timeout_ms,
            LedgerConfig::DEFAULT_FETCH_TIMEOUT,
        )?;
        let interval = positive_millis(
            "poll_interval_ms",
            self.overrides.poll_interval_ms.or(poller.poll_interval_ms),
            PollSchedule::DEFAULT_INTERVAL,
        )?;
        let max_backoff = positive_millis(
            "poller.max_backoff_ms",
            poller.max_backoff_ms,
            PollSchedule::DEFAULT_MAX_BACKOFF,
        )?;

        Ok(IndexerConfig {
            ledger: LedgerConfig {
                module_address,
                network,
                indexer_url,
                batch_size,
                fetch_timeout,
            },
            schedule: PollSchedule {
                interval,
                max_backoff,
            },
        })
    }
}

fn positive_millis(
    name: &str,
    value: Option<u64>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(0) => Err(ConfigError::ValidationError(format!(
            "{name} must be greater than zero"
        ))),
        Some(ms) => Ok(Duration::from_millis(ms)),
    }
}

/// Accepts `0x` followed by 1 to 64 hex digits; returns it lowercased.
fn validate_address(address: &str) -> Result<String, ConfigError> {
    let address = address.trim().to_ascii_lowercase();
    let digits = address.strip_prefix("0x").unwrap_or("");
    if digits.is_empty() || digits.len() > 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::ValidationError(format!(
            "module address `{address}` is not a 0x-prefixed hex account address"
        )));
    }
    Ok(address)
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(overrides: Overrides) -> ConfigLoader {
        ConfigLoader::new(None, overrides)
    }

    fn file(toml_str: &str) -> FileConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = loader(Overrides {
            module_address: Some("0xABC".to_string()),
            ..Overrides::default()
        })
        .build(FileConfig::default())
        .unwrap();
        assert_eq!(config.ledger.module_address, "0xabc");
        assert_eq!(config.ledger.network, Network::Devnet);
        assert_eq!(config.ledger.indexer_url.as_str(), Network::Devnet.indexer_url());
        assert_eq!(config.ledger.batch_size, 50);
        assert_eq!(config.ledger.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.schedule.interval, Duration::from_secs(10));
        assert_eq!(config.schedule.max_backoff, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_module_address_is_fatal() {
        let result = loader(Overrides::default()).build(FileConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingModuleAddress)));

        let blank = loader(Overrides {
            module_address: Some("  ".to_string()),
            ..Overrides::default()
        })
        .build(FileConfig::default());
        assert!(matches!(blank, Err(ConfigError::MissingModuleAddress)));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file_config = file(
            r#"
[ledger]
module_address = "0x1"
network = "mainnet"

[poller]
poll_interval_ms = 30000
"#,
        );
        let config = loader(Overrides {
            module_address: Some("0x2".to_string()),
            network: Some(Network::Testnet),
            poll_interval_ms: Some(1500),
        })
        .build(file_config)
        .unwrap();
        assert_eq!(config.ledger.module_address, "0x2");
        assert_eq!(config.ledger.network, Network::Testnet);
        assert_eq!(config.schedule.interval, Duration::from_millis(1500));
    }

    #[test]
    fn test_file_values_are_used() {
        let config = loader(Overrides::default())
            .build(file(
                r#"
[ledger]
module_address = "0xfeed"
indexer_url = "http://127.0.0.1:9000/graphql"
batch_size = 100

[poller]
max_backoff_ms = 120000
"#,
            ))
            .unwrap();
        assert_eq!(config.ledger.module_address, "0xfeed");
        assert_eq!(config.ledger.indexer_url.as_str(), "http://127.0.0.1:9000/graphql");
        assert_eq!(config.ledger.batch_size, 100);
        assert_eq!(config.schedule.max_backoff, Duration::from_secs(120));
    }

    #[test]
    fn test_validation_errors() {
        let with_address = || Overrides {
            module_address: Some("0x1".to_string()),
            ..Overrides::default()
        };
        let zero_batch = loader(with_address()).build(file("[ledger]\nbatch_size = 0\n"));
        assert!(matches!(zero_batch, Err(ConfigError::ValidationError(_))));

        let zero_interval = loader(Overrides {
            poll_interval_ms: Some(0),
            ..with_address()
        })
        .build(FileConfig::default());
        assert!(matches!(zero_interval, Err(ConfigError::ValidationError(_))));

        let bad_address = loader(Overrides {
            module_address: Some("verity".to_string()),
            ..Overrides::default()
        })
        .build(FileConfig::default());
        assert!(matches!(bad_address, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let loader = ConfigLoader::new(
            Some(Path::new("/nonexistent/verity-indexer.toml")),
            Overrides::default(),
        );
        assert!(matches!(loader.load(), Err(ConfigError::IoError { .. })));
    }
}
