//! Stream identities and the reports the stream runners hand to the
//! orchestrator.
//!
//! # Report Flow
//!
//! 1. `StreamRunner` ticks its `StreamPoller` on its own schedule
//! 2. each tick produces a `StreamReport` -> report channel
//! 3. `IndexerOrchestrator` aggregates reports and logs one summary per
//!    poll interval

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, StreamReportReceiver, StreamReportSender, stream_report_channel,
};

pub use types::{EventKind, StreamReport, TickFailure};
