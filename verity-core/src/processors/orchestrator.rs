//! IndexerOrchestrator processor.
//!
//! The IndexerOrchestrator is responsible for:
//! - Spawning one `StreamRunner` per stream
//! - Collecting `StreamReport`s and logging a summary once per poll interval
//! - Logging runners that exit unexpectedly without touching the others
//! - Propagating shutdown and waiting for in-flight ticks to finish

use super::stream_poller::StreamPoller;
use super::stream_runner::StreamRunner;
use crate::events::{EventKind, StreamReport, TickFailure, stream_report_channel};
use crate::utils::backoff::PollSchedule;
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub struct IndexerOrchestrator {
    pollers: Vec<StreamPoller>,
    schedule: PollSchedule,
}

impl IndexerOrchestrator {
    pub fn new(schedule: PollSchedule) -> Self {
        Self {
            pollers: Vec::new(),
            schedule,
        }
    }

    pub fn with_stream(mut self, poller: StreamPoller) -> Self {
        self.pollers.push(poller);
        self
    }

    pub fn stream_count(&self) -> usize {
        self.pollers.len()
    }

    /// Run all streams until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let (report_tx, mut report_rx) = stream_report_channel();
        let mut summary = TickSummary::new(self.pollers.iter().map(StreamPoller::kind));
        let mut runners = JoinSet::new();
        for poller in self.pollers {
            let runner =
                StreamRunner::new(poller, self.schedule, report_tx.clone(), shutdown_rx.clone());
            runners.spawn(runner.run());
        }
        drop(report_tx);

        info!(
            streams = runners.len(),
            interval_ms = self.schedule.interval.as_millis() as u64,
            "IndexerOrchestrator started"
        );

        let mut summary_interval = tokio::time::interval(self.schedule.interval);
        summary_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to report yet.
        summary_interval.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("IndexerOrchestrator received shutdown signal");
                        break;
                    }
                }

                Some(report) = report_rx.recv() => {
                    summary.record(&report);
                }

                Some(joined) = runners.join_next() => {
                    match joined {
                        Ok(()) => warn!("StreamRunner exited before shutdown"),
                        Err(e) => error!(error = %e, "StreamRunner aborted"),
                    }
                    if runners.is_empty() {
                        warn!("No stream runners left");
                        break;
                    }
                }

                _ = summary_interval.tick() => {
                    summary.log_and_reset();
                }
            }
        }

        // Runners finish their current tick, then observe the shutdown flag.
        loop {
            tokio::select! {
                Some(report) = report_rx.recv() => summary.record(&report),
                joined = runners.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => error!(error = %e, "StreamRunner aborted during shutdown"),
                    None => break,
                },
            }
        }
        while let Ok(report) = report_rx.try_recv() {
            summary.record(&report);
        }
        summary.log_and_reset();

        info!("IndexerOrchestrator shutdown complete");
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StreamStats {
    ticks: u32,
    fetched: usize,
    applied: usize,
    failures: u32,
    cursor: Option<u64>,
    last_failure: Option<TickFailure>,
}

/// Per-stream counters accumulated between two summary lines.
///
/// Streams are few, so they are kept in a `Vec` and scanned linearly.
struct TickSummary {
    streams: Vec<(EventKind, StreamStats)>,
}

impl TickSummary {
    fn new(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            streams: kinds
                .into_iter()
                .map(|kind| (kind, StreamStats::default()))
                .collect(),
        }
    }

    fn record(&mut self, report: &StreamReport) {
        let index = match self.streams.iter().position(|(kind, _)| *kind == report.kind) {
            Some(index) => index,
            None => {
                self.streams.push((report.kind, StreamStats::default()));
                self.streams.len() - 1
            }
        };
        let stats = &mut self.streams[index].1;
        stats.ticks += 1;
        stats.fetched += report.fetched;
        stats.applied += report.applied;
        if let Some(failure) = report.failure {
            stats.failures += 1;
            stats.last_failure = Some(failure);
        }
        // Reports without a cursor reading carry a placeholder zero
        if !matches!(
            report.failure,
            Some(TickFailure::CursorRead | TickFailure::Panicked)
        ) {
            stats.cursor = Some(report.cursor);
        }
    }

    fn totals(&self) -> (usize, usize, u32) {
        self.streams
            .iter()
            .fold((0, 0, 0), |(fetched, applied, failures), (_, s)| {
                (fetched + s.fetched, applied + s.applied, failures + s.failures)
            })
    }

    fn log_and_reset(&mut self) {
        let (fetched, applied, failures) = self.totals();
        info!(
            fetched,
            applied,
            failures,
            streams = %self,
            "Indexer tick summary"
        );
        for (_, stats) in &mut self.streams {
            // Keep the last known cursor across summaries
            *stats = StreamStats {
                cursor: stats.cursor,
                ..StreamStats::default()
            };
        }
    }
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, stats)) in self.streams.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(
                f,
                "{kind}: ticks={} fetched={} applied={} failures={}",
                stats.ticks, stats.fetched, stats.applied, stats.failures
            )?;
            match stats.cursor {
                Some(cursor) => write!(f, " cursor={cursor}")?,
                None => f.write_str(" cursor=?")?,
            }
            if let Some(failure) = stats.last_failure {
                write!(f, " last_failure={failure}")?;
            }
        }
        Ok(())
    }
}
