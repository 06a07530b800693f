//! Supervisor processor.
//!
//! Consumes the `WorkerEvent` channel shared by all workers and logs every
//! outcome. It runs until every worker has dropped its sender, so events
//! emitted during shutdown are still logged.

use crate::events::{WorkerEvent, WorkerEventReceiver};
use crate::ledger::VerdictOutcome;
use kanau::processor::Processor;
use std::convert::Infallible;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStats {
    pub applied: u64,
    pub overloads: u64,
    pub oracle_failures: u64,
    pub ledger_failures: u64,
}

pub struct Supervisor {
    events_rx: WorkerEventReceiver,
}

impl Supervisor {
    pub fn new(events_rx: WorkerEventReceiver) -> Self {
        Self { events_rx }
    }

    /// Log events until all senders are gone; returns the totals.
    pub async fn run(mut self) -> SupervisorStats {
        info!("Supervisor started");
        let mut stats = SupervisorStats::default();

        while let Some(event) = self.events_rx.recv().await {
            match &event {
                WorkerEvent::Applied { .. } => stats.applied += 1,
                WorkerEvent::Overloaded { .. } => stats.overloads += 1,
                WorkerEvent::OracleFailed { .. } => stats.oracle_failures += 1,
                WorkerEvent::LedgerFailed { .. } => stats.ledger_failures += 1,
            }
            let Ok(()) = self.process(event).await;
        }

        info!(
            applied = stats.applied,
            overloads = stats.overloads,
            oracle_failures = stats.oracle_failures,
            ledger_failures = stats.ledger_failures,
            "Supervisor shutdown complete"
        );
        stats
    }
}

impl Processor<WorkerEvent> for Supervisor {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: WorkerEvent) -> Result<(), Infallible> {
        match event {
            WorkerEvent::Applied {
                worker,
                number,
                status,
                outcome: VerdictOutcome::Applied,
            } => {
                info!(worker, order = %number, %status, "Verdict applied");
            }
            WorkerEvent::Applied {
                worker,
                number,
                status,
                outcome,
            } => {
                debug!(worker, order = %number, %status, ?outcome, "Verdict not applied");
            }
            WorkerEvent::Overloaded {
                worker,
                number,
                cooldown,
            } => {
                warn!(
                    worker,
                    order = %number,
                    cooldown_secs = cooldown.as_secs(),
                    "Accrual service overloaded, pausing pool"
                );
            }
            WorkerEvent::OracleFailed {
                worker,
                number,
                error,
            } => {
                debug!(worker, order = %number, error = %error, "Accrual query failed");
            }
            WorkerEvent::LedgerFailed {
                worker,
                number,
                error,
            } => {
                error!(worker, order = %number, error = %error, "Failed to apply verdict");
            }
        }
        Ok(())
    }
}
