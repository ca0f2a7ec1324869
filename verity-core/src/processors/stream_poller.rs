//! StreamPoller processor.
//!
//! The StreamPoller owns one event stream and runs a single tick at a time:
//!
//! `Idle -> Fetching -> Sorting -> Applying -> Advancing -> Idle`
//!
//! The cursor only moves to the highest version whose events were all
//! applied, and only once the cursor write itself succeeds. A failed
//! handler stops the batch, so the next tick re-fetches and retries from
//! that version; no event is ever skipped.
//!
//! A transaction may emit several events of one type, all sharing its
//! version. When a page comes back full its last version may be cut short,
//! so that version is left for the next tick. A page filled by a single
//! transaction is re-fetched with a wider limit.

use crate::events::{EventKind, StreamReport, TickFailure};
use crate::handlers::{ApplyContext, EventHandler, handler_for};
use crate::ledger::{FetchError, FetchRequest, LedgerClient, LedgerEvent};
use crate::store::{CursorStore, DomainStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Phases of a tick, as they appear in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    Sorting,
    Applying,
    Advancing,
}

/// Static parameters of one stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub kind: EventKind,
    /// Account that emits the events (the module address).
    pub account: String,
    pub batch_size: u32,
    pub fetch_timeout: Duration,
}

impl StreamSettings {
    pub const DEFAULT_BATCH_SIZE: u32 = 50;
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
    /// Largest page requested, including widened re-fetches.
    pub const MAX_BATCH_SIZE: u32 = 1000;
}

pub struct StreamPoller {
    kind: EventKind,
    event_type: String,
    account: String,
    batch_size: u32,
    fetch_timeout: Duration,
    ledger: Arc<dyn LedgerClient>,
    cursors: Arc<dyn CursorStore>,
    domain: Arc<dyn DomainStore>,
    handler: Box<dyn EventHandler>,
}

impl StreamPoller {
    /// Create a poller using the stock handler for `settings.kind`.
    pub fn new(
        settings: StreamSettings,
        ledger: Arc<dyn LedgerClient>,
        cursors: Arc<dyn CursorStore>,
        domain: Arc<dyn DomainStore>,
    ) -> Self {
        let handler = handler_for(settings.kind);
        Self::with_handler(settings, ledger, cursors, domain, handler)
    }

    pub fn with_handler(
        settings: StreamSettings,
        ledger: Arc<dyn LedgerClient>,
        cursors: Arc<dyn CursorStore>,
        domain: Arc<dyn DomainStore>,
        handler: Box<dyn EventHandler>,
    ) -> Self {
        Self {
            kind: settings.kind,
            event_type: settings.kind.event_type(&settings.account),
            account: settings.account,
            batch_size: settings.batch_size,
            fetch_timeout: settings.fetch_timeout,
            ledger,
            cursors,
            domain,
            handler,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Cursor key of the stream.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Run one tick. Never fails: errors are logged and reflected in the
    /// returned report, and the durable cursor is left where it was.
    pub async fn tick(&self, observed_at: time::OffsetDateTime) -> StreamReport {
        let stream = self.kind;
        let mut report = StreamReport {
            kind: stream,
            fetched: 0,
            applied: 0,
            cursor: 0,
            failure: None,
        };

        let cursor = match self.cursors.get(&self.event_type).await {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(%stream, event_type = %self.event_type, error = %e, "Failed to read cursor");
                report.failure = Some(TickFailure::CursorRead);
                return report;
            }
        };
        report.cursor = cursor;

        let mut limit = self.batch_size;
        let (batch, page_full) = loop {
            debug!(%stream, phase = ?PollPhase::Fetching, cursor, limit, "Fetching events");
            let batch = match self.fetch(cursor, limit).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(%stream, event_type = %self.event_type, cursor, error = %e, "Fetch failed");
                    report.failure = Some(TickFailure::Fetch);
                    return report;
                }
            };
            let page_full = batch.len() >= limit as usize;
            let Some(version) = single_pending_version(&batch, cursor).filter(|_| page_full) else {
                break (batch, page_full);
            };
            if limit >= StreamSettings::MAX_BATCH_SIZE {
                error!(
                    %stream,
                    event_type = %self.event_type,
                    version,
                    limit,
                    "Transaction emits more events than the largest page holds"
                );
                report.fetched = batch.len();
                report.failure = Some(TickFailure::PageOverflow { version });
                return report;
            }
            limit = limit.saturating_mul(2).min(StreamSettings::MAX_BATCH_SIZE);
            warn!(%stream, version, limit, "Page filled by one transaction, widening fetch");
        };
        report.fetched = batch.len();

        debug!(%stream, phase = ?PollPhase::Sorting, fetched = batch.len(), page_full, "Sorting batch");
        let pending = pending_events(batch, cursor, page_full);
        if pending.is_empty() {
            debug!(%stream, phase = ?PollPhase::Idle, cursor, "No new events");
            return report;
        }

        debug!(%stream, phase = ?PollPhase::Applying, pending = pending.len(), "Applying events");
        let ctx = ApplyContext { observed_at };
        let mut failed_at = None;
        for event in &pending {
            match self.handler.apply(self.domain.as_ref(), event, &ctx).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    error!(
                        %stream,
                        event_type = %self.event_type,
                        version = event.version,
                        event_index = event.event_index,
                        error = %e,
                        "Handler failed, holding cursor before this version"
                    );
                    report.failure = Some(TickFailure::Handler {
                        version: event.version,
                    });
                    failed_at = Some(event.version);
                    break;
                }
            }
        }

        // Events of the failed version that did apply are re-applied next tick.
        let highest_applied = match failed_at {
            None => pending.last().map(|event| event.version),
            Some(failed) => pending
                .iter()
                .map(|event| event.version)
                .take_while(|&version| version < failed)
                .last(),
        };

        let Some(version) = highest_applied else {
            return report;
        };

        debug!(%stream, phase = ?PollPhase::Advancing, version, "Advancing cursor");
        match self.cursors.set(&self.event_type, version).await {
            Ok(stored) => {
                report.cursor = stored;
                info!(
                    %stream,
                    applied = report.applied,
                    cursor = stored,
                    "Stream advanced"
                );
            }
            Err(e) => {
                error!(
                    %stream,
                    event_type = %self.event_type,
                    version,
                    error = %e,
                    "Failed to persist cursor, events will be re-applied next tick"
                );
                if report.failure.is_none() {
                    report.failure = Some(TickFailure::CursorWrite { version });
                }
            }
        }
        debug!(%stream, phase = ?PollPhase::Idle, "Tick complete");
        report
    }

    async fn fetch(&self, after_version: u64, limit: u32) -> Result<Vec<LedgerEvent>, FetchError> {
        let request = FetchRequest {
            account: self.account.clone(),
            event_type: self.event_type.clone(),
            limit,
            after_version,
        };
        match tokio::time::timeout(self.fetch_timeout, self.ledger.fetch_events(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout)),
        }
    }
}

/// Orders a fetched batch for application: drops everything at or below
/// `cursor`, sorts by `(version, event_index)` and removes duplicates.
///
/// When `page_full` is set the last version of the page may be incomplete
/// and is dropped as well; it is fetched again from the next cursor.
pub fn pending_events(
    mut batch: Vec<LedgerEvent>,
    cursor: u64,
    page_full: bool,
) -> Vec<LedgerEvent> {
    batch.retain(|event| event.version > cursor);
    batch.sort_by_key(|event| (event.version, event.event_index));
    batch.dedup_by_key(|event| (event.version, event.event_index));
    if page_full {
        if let Some(tail) = batch.last().map(|event| event.version) {
            batch.retain(|event| event.version < tail);
        }
    }
    batch
}

/// The version shared by every event above `cursor`, if there is exactly one.
fn single_pending_version(batch: &[LedgerEvent], cursor: u64) -> Option<u64> {
    let mut versions = batch
        .iter()
        .map(|event| event.version)
        .filter(|&version| version > cursor);
    let first = versions.next()?;
    versions.all(|version| version == first).then_some(first)
}
