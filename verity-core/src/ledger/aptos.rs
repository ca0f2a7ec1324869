//! Aptos indexer client.
//!
//! Reads module events through the Aptos indexer GraphQL API, paging forward
//! from the stream cursor in ascending transaction version order.

use super::{FetchError, FetchRequest, LedgerClient, LedgerEvent};
use crate::utils::json::u64_from_json;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Aptos network the module is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    #[default]
    Devnet,
    Local,
}

impl Network {
    /// Public indexer GraphQL endpoint of the network.
    pub fn indexer_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet.aptoslabs.com/v1/graphql",
            Network::Testnet => "https://api.testnet.aptoslabs.com/v1/graphql",
            Network::Devnet => "https://api.devnet.aptoslabs.com/v1/graphql",
            Network::Local => "http://127.0.0.1:8090/v1/graphql",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Local => "local",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("unknown network `{0}`, expected mainnet, testnet, devnet or local")]
pub struct UnknownNetwork(String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "local" | "localnet" => Ok(Network::Local),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

/// Pads an account address to the 64 hex digit form the indexer stores.
pub fn normalize_address(address: &str) -> String {
    let hex = address
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .to_ascii_lowercase();
    format!("0x{hex:0>64}")
}

const ACCOUNT_EVENTS_QUERY: &str = r#"
query AccountEvents($account: String!, $eventType: String!, $after: bigint!, $limit: Int!) {
  events(
    where: {
      account_address: { _eq: $account }
      indexed_type: { _eq: $eventType }
      transaction_version: { _gt: $after }
    }
    order_by: [{ transaction_version: asc }, { event_index: asc }]
    limit: $limit
  ) {
    transaction_version
    event_index
    sequence_number
    type
    data
  }
}
"#;

pub struct AptosIndexerClient {
    endpoint: Url,
    http_client: reqwest::Client,
}

impl AptosIndexerClient {
    /// Create a client for `endpoint`; every request is bounded by `timeout`.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl LedgerClient for AptosIndexerClient {
    async fn fetch_events(&self, request: FetchRequest) -> Result<Vec<LedgerEvent>, FetchError> {
        let body = GraphQlRequest {
            query: ACCOUNT_EVENTS_QUERY,
            variables: AccountEventsVariables {
                account: normalize_address(&request.account),
                event_type: &request.event_type,
                after: request.after_version,
                limit: request.limit,
            },
        };

        debug!(
            event_type = %request.event_type,
            after_version = request.after_version,
            limit = request.limit,
            "Fetching account events"
        );

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let response: GraphQlResponse<EventsData> = response.json().await?;
        parse_events_response(response)
    }
}

fn parse_events_response(
    response: GraphQlResponse<EventsData>,
) -> Result<Vec<LedgerEvent>, FetchError> {
    if let Some(error) = response.errors.into_iter().next() {
        return Err(FetchError::Api {
            message: error.message,
        });
    }
    let Some(data) = response.data else {
        return Err(FetchError::Malformed("response has no data".to_string()));
    };
    data.events
        .into_iter()
        .map(|event| {
            let version = u64_from_json(&event.transaction_version).ok_or_else(|| {
                FetchError::Malformed(format!(
                    "invalid transaction_version: {}",
                    event.transaction_version
                ))
            })?;
            let event_index = u64_from_json(&event.event_index).ok_or_else(|| {
                FetchError::Malformed(format!("invalid event_index: {}", event.event_index))
            })?;
            let sequence_number = u64_from_json(&event.sequence_number).ok_or_else(|| {
                FetchError::Malformed(format!(
                    "invalid sequence_number: {}",
                    event.sequence_number
                ))
            })?;
            Ok(LedgerEvent {
                version,
                event_index,
                sequence_number,
                event_type: event.event_type,
                data: event.data,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'static str,
    variables: AccountEventsVariables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountEventsVariables<'a> {
    account: String,
    event_type: &'a str,
    after: u64,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct EventsData {
    #[serde(default)]
    events: Vec<IndexerEvent>,
}

// bigint columns come back as numbers or strings depending on the indexer version
#[derive(Debug, Deserialize)]
struct IndexerEvent {
    transaction_version: serde_json::Value,
    event_index: serde_json::Value,
    sequence_number: serde_json::Value,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<Vec<LedgerEvent>, FetchError> {
        let response: GraphQlResponse<EventsData> = serde_json::from_value(body).unwrap();
        parse_events_response(response)
    }

    #[test]
    fn test_parse_events() {
        let events = parse(json!({
            "data": {
                "events": [
                    {
                        "transaction_version": 12,
                        "event_index": 0,
                        "sequence_number": "3",
                        "type": "0x1::verity_vest::GrantCreatedEvent",
                        "data": { "grant_id": "0xab" }
                    },
                    {
                        "transaction_version": "15",
                        "event_index": "1",
                        "sequence_number": 4,
                        "type": "0x1::verity_vest::GrantCreatedEvent",
                        "data": { "grant_id": "0xcd" }
                    },
                    {
                        "transaction_version": "15",
                        "event_index": "2",
                        "sequence_number": 0,
                        "type": "0x1::verity_vest::GrantCreatedEvent",
                        "data": { "grant_id": "0xef" }
                    }
                ]
            }
        }))
        .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].version, 12);
        assert_eq!(events[0].sequence_number, 3);
        assert_eq!(events[1].version, 15);
        assert_eq!(events[1].event_index, 1);
        assert_eq!(events[1].data["grant_id"], "0xcd");
        assert_eq!((events[2].version, events[2].event_index), (15, 2));
    }

    #[test]
    fn test_graphql_error_is_api_error() {
        let result = parse(json!({
            "data": null,
            "errors": [{ "message": "field 'events' not found" }]
        }));
        assert!(matches!(result, Err(FetchError::Api { message }) if message.contains("events")));
    }

    #[test]
    fn test_bad_version_is_malformed() {
        let result = parse(json!({
            "data": { "events": [{
                "transaction_version": "abc",
                "event_index": 0,
                "sequence_number": 0,
                "type": "t",
                "data": {}
            }]}
        }));
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0xAB"),
            format!("0x{}ab", "0".repeat(62))
        );
        let full = format!("0x{}", "1".repeat(64));
        assert_eq!(normalize_address(&full), full);
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("Mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("localnet".parse::<Network>().unwrap(), Network::Local);
        assert!("moonnet".parse::<Network>().is_err());
        assert_eq!(Network::default(), Network::Devnet);
    }
}
