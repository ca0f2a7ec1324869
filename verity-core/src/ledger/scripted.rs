use super::{FetchError, FetchRequest, LedgerClient, LedgerEvent};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

/// Replays queued responses per event type. An empty queue yields an empty
/// batch, and event types marked as down always fail.
#[derive(Default)]
pub(crate) struct ScriptedLedger {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<LedgerEvent>, String>>>>,
    down: Mutex<HashSet<String>>,
    stall: Mutex<Option<Duration>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedLedger {
    pub(crate) async fn push_batch(&self, event_type: &str, events: Vec<LedgerEvent>) {
        self.responses
            .lock()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push_back(Ok(events));
    }

    pub(crate) async fn push_failure(&self, event_type: &str) {
        self.responses
            .lock()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push_back(Err("connection reset".to_string()));
    }

    pub(crate) async fn set_down(&self, event_type: &str) {
        self.down.lock().await.insert(event_type.to_string());
    }

    /// Delay every response by `delay`.
    pub(crate) async fn set_stall(&self, delay: Duration) {
        *self.stall.lock().await = Some(delay);
    }

    pub(crate) async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn fetch_events(&self, request: FetchRequest) -> Result<Vec<LedgerEvent>, FetchError> {
        self.requests.lock().await.push(request.clone());
        let stall = *self.stall.lock().await;
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if self.down.lock().await.contains(&request.event_type) {
            return Err(FetchError::Api {
                message: "service unavailable".to_string(),
            });
        }
        let next = self
            .responses
            .lock()
            .await
            .get_mut(&request.event_type)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(events)) => Ok(events),
            Some(Err(message)) => Err(FetchError::Api { message }),
            None => Ok(Vec::new()),
        }
    }
}

/// Builds the only event of `event_type` in the transaction at `version`.
pub(crate) fn event(event_type: &str, version: u64, data: serde_json::Value) -> LedgerEvent {
    event_at(event_type, version, 0, data)
}

/// Builds the `index`-th event of the transaction at `version`.
pub(crate) fn event_at(
    event_type: &str,
    version: u64,
    index: u64,
    data: serde_json::Value,
) -> LedgerEvent {
    LedgerEvent {
        version,
        event_index: index,
        sequence_number: version,
        event_type: event_type.to_string(),
        data,
    }
}

/// Hex encoding of `text` as a Move `vector<u8>` argument.
pub(crate) fn hex_text(text: &str) -> String {
    format!("0x{}", hex::encode(text))
}
