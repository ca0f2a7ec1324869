//! Processors driving the indexer.
//!
//! - `StreamPoller`: one tick of one stream: read cursor, fetch, sort,
//!   filter, apply, advance
//! - `StreamRunner`: re-ticks a poller on its schedule, backs off on
//!   failure, emits `StreamReport`
//! - `IndexerOrchestrator`: spawns one runner per stream, aggregates
//!   reports, coordinates shutdown

pub mod orchestrator;
pub mod stream_poller;
pub mod stream_runner;

pub use orchestrator::IndexerOrchestrator;
pub use stream_poller::{PollPhase, StreamPoller, StreamSettings, pending_events};
pub use stream_runner::StreamRunner;
