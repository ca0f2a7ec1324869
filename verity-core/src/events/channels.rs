//! Report channel factory and handles.

use super::types::StreamReport;
use tokio::sync::mpsc;

/// Default buffer size for the report channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for StreamReport events.
pub type StreamReportSender = mpsc::Sender<StreamReport>;
/// Receiver handle for StreamReport events.
pub type StreamReportReceiver = mpsc::Receiver<StreamReport>;

/// Create a new StreamReport channel.
///
/// Every stream runner holds a clone of the sender; the orchestrator owns
/// the receiver.
pub fn stream_report_channel() -> (StreamReportSender, StreamReportReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
