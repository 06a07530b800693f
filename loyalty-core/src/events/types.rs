//! Event type definitions.

use crate::entities::{OrderNumber, OrderStatus};
use crate::ledger::VerdictOutcome;
use crate::oracle::OracleError;
use std::time::Duration;

/// Outcome of one reconciliation attempt, reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A verdict reached the ledger.
    Applied {
        worker: usize,
        number: OrderNumber,
        status: OrderStatus,
        outcome: VerdictOutcome,
    },
    /// The accrual service signalled overload; the pool pauses for `cooldown`.
    Overloaded {
        worker: usize,
        number: OrderNumber,
        cooldown: Duration,
    },
    /// The accrual service could not give a verdict. The order stays pending
    /// and is picked up again by discovery.
    OracleFailed {
        worker: usize,
        number: OrderNumber,
        error: OracleError,
    },
    /// The ledger rejected the verdict. Nothing was applied.
    LedgerFailed {
        worker: usize,
        number: OrderNumber,
        error: String,
    },
}
