//! Event channel factories and handles.

use super::types::WorkerEvent;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for WorkerEvent events.
pub type WorkerEventSender = mpsc::Sender<WorkerEvent>;
/// Receiver handle for WorkerEvent events.
pub type WorkerEventReceiver = mpsc::Receiver<WorkerEvent>;

/// Create a new WorkerEvent channel.
///
/// Returns a (sender, receiver) pair. Every worker holds a clone of the
/// sender; the supervisor owns the receiver.
pub fn worker_event_channel() -> (WorkerEventSender, WorkerEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
