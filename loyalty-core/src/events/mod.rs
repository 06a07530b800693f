//! Events of the reconciliation engine.
//!
//! # Event Flow
//!
//! 1. `DiscoveryTicker` reads pending orders and pushes their numbers into
//!    the `OrderQueue`
//! 2. Workers take numbers from the queue, query the accrual service and
//!    apply verdicts to the ledger
//! 3. Every worker reports what happened as a `WorkerEvent` to the
//!    supervisor, which logs it
//!
//! Events carry order numbers, never order state. The ledger stays the
//! single source of truth.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, WorkerEventReceiver, WorkerEventSender, worker_event_channel,
};

pub use types::WorkerEvent;
