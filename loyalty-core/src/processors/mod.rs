//! Processors of the reconciliation engine.
//!
//! - `DiscoveryTicker`: periodically reads pending orders from the ledger,
//!   pushes their numbers into the `OrderQueue`
//! - `Worker`: takes numbers from the queue, queries the accrual service,
//!   applies verdicts, emits `WorkerEvent`
//! - `Supervisor`: receives `WorkerEvent`, logs it
//! - `Backoff`: pool-wide pause shared by all workers
//!
//! `ReconciliationEngine` wires them together.

pub mod backoff;
pub mod discovery;
pub mod engine;
pub mod queue;
pub mod supervisor;
pub mod worker;

pub use backoff::Backoff;
pub use discovery::DiscoveryTicker;
pub use engine::{EngineHandle, ReconciliationEngine};
pub use queue::{OrderQueue, QueueClosed};
pub use supervisor::Supervisor;
pub use worker::Worker;

use tokio::sync::watch;

/// Resolve once the flag turns `true` or its sender is gone.
///
/// Used for the shutdown signal and for closing the order queue.
pub(crate) async fn flag_raised(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|raised| *raised).await;
}
