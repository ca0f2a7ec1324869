//! StreamRunner processor.
//!
//! The StreamRunner is responsible for:
//! - Ticking one `StreamPoller` on its own schedule
//! - Running every tick in its own task so a panic is contained to that tick
//! - Backing off exponentially while ticks keep failing
//! - Emitting a `StreamReport` per tick
//! - Finishing the in-flight tick before honoring shutdown

use super::stream_poller::StreamPoller;
use crate::events::{StreamReport, StreamReportSender, TickFailure};
use crate::utils::backoff::{PollSchedule, with_jitter};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct StreamRunner {
    poller: Arc<StreamPoller>,
    schedule: PollSchedule,
    report_tx: StreamReportSender,
    shutdown_rx: watch::Receiver<bool>,
}

impl StreamRunner {
    pub fn new(
        poller: StreamPoller,
        schedule: PollSchedule,
        report_tx: StreamReportSender,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            poller: Arc::new(poller),
            schedule,
            report_tx,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(mut self) {
        let stream = self.poller.kind();
        info!(%stream, event_type = %self.poller.event_type(), "StreamRunner started");

        let mut consecutive_failures: u32 = 0;
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let report = self.tick_isolated().await;
            consecutive_failures = if report.is_success() {
                0
            } else {
                consecutive_failures.saturating_add(1)
            };

            if let Err(e) = self.report_tx.send(report).await {
                debug!(%stream, error = %e, "Report receiver dropped");
            }

            let delay = self.schedule.next_delay(consecutive_failures);
            if consecutive_failures > 0 {
                warn!(
                    %stream,
                    consecutive_failures,
                    delay_ms = delay.as_millis() as u64,
                    "Stream tick failed, backing off"
                );
            }

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = tokio::time::sleep(with_jitter(delay)) => {}
            }
        }

        info!(%stream, "StreamRunner shutdown complete");
    }

    async fn tick_isolated(&self) -> StreamReport {
        let poller = Arc::clone(&self.poller);
        let observed_at = time::OffsetDateTime::now_utc();
        match tokio::spawn(async move { poller.tick(observed_at).await }).await {
            Ok(report) => report,
            Err(e) => {
                let stream = self.poller.kind();
                error!(%stream, error = %e, "Stream tick panicked");
                StreamReport {
                    kind: stream,
                    fetched: 0,
                    applied: 0,
                    cursor: 0,
                    failure: Some(TickFailure::Panicked),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, stream_report_channel};
    use crate::handlers::{ApplyContext, EventHandler, HandlerError};
    use crate::ledger::LedgerEvent;
    use crate::ledger::scripted::{ScriptedLedger, event};
    use crate::processors::StreamSettings;
    use crate::store::DomainStore;
    use crate::store::memory::{MemoryCursorStore, MemoryDomainStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> StreamSettings {
        StreamSettings {
            kind: EventKind::GrantCreated,
            account: "0x1".to_string(),
            batch_size: 10,
            fetch_timeout: Duration::from_secs(1),
        }
    }

    fn schedule() -> PollSchedule {
        PollSchedule {
            interval: Duration::from_secs(10),
            max_backoff: Duration::from_secs(80),
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn apply(
            &self,
            _store: &dyn DomainStore,
            _event: &LedgerEvent,
            _ctx: &ApplyContext,
        ) -> Result<(), HandlerError> {
            panic!("handler bug");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_stream_backs_off() {
        let ledger = Arc::new(ScriptedLedger::default());
        let event_type = EventKind::GrantCreated.event_type("0x1");
        ledger.set_down(&event_type).await;
        let poller = StreamPoller::new(
            settings(),
            ledger.clone(),
            Arc::new(MemoryCursorStore::new()),
            Arc::new(MemoryDomainStore::new()),
        );
        let (report_tx, mut report_rx) = stream_report_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(StreamRunner::new(poller, schedule(), report_tx, shutdown_rx).run());

        tokio::time::sleep(Duration::from_secs(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at ~0s, ~20s and ~60s; a fixed 10s interval would have made ten.
        assert_eq!(ledger.requests().await.len(), 3);
        let report = report_rx.recv().await.unwrap();
        assert_eq!(report.failure, Some(TickFailure::Fetch));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_is_contained() {
        let ledger = Arc::new(ScriptedLedger::default());
        let event_type = EventKind::GrantCreated.event_type("0x1");
        ledger
            .push_batch(&event_type, vec![event(&event_type, 1, json!({}))])
            .await;
        let poller = StreamPoller::with_handler(
            settings(),
            ledger.clone(),
            Arc::new(MemoryCursorStore::new()),
            Arc::new(MemoryDomainStore::new()),
            Box::new(PanickingHandler),
        );
        let (report_tx, mut report_rx) = stream_report_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(StreamRunner::new(poller, schedule(), report_tx, shutdown_rx).run());

        let first = report_rx.recv().await.unwrap();
        assert_eq!(first.failure, Some(TickFailure::Panicked));
        // The runner survives and keeps ticking; the queue is now empty.
        let second = report_rx.recv().await.unwrap();
        assert!(second.is_success());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
