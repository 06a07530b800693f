//! Reconciliation worker.
//!
//! Each worker loops over:
//! - Taking an order number from the shared `OrderQueue`
//! - Waiting for the pool-wide `Backoff` to allow queries
//! - Querying the accrual service, bounded by a timeout
//! - Applying the verdict to the ledger
//! - Reporting the outcome as a `WorkerEvent`
//!
//! A failed query or ledger write never stops the worker. The order stays
//! pending in the ledger and the next discovery cycle queues it again.

use super::{Backoff, OrderQueue, flag_raised};
use crate::entities::{OrderNumber, OrderStatus};
use crate::events::{WorkerEvent, WorkerEventSender};
use crate::ledger::Ledger;
use crate::oracle::{AccrualOracle, OracleError, Verdict};
use kanau::processor::Processor;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Everything the workers of one pool share.
#[derive(Clone)]
pub struct PoolContext {
    pub ledger: Arc<dyn Ledger>,
    pub oracle: Arc<dyn AccrualOracle>,
    pub queue: Arc<OrderQueue>,
    pub backoff: Backoff,
    pub events: WorkerEventSender,
    pub oracle_timeout: Duration,
}

pub struct Worker {
    id: usize,
    ctx: PoolContext,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(id: usize, ctx: PoolContext, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            id,
            ctx,
            shutdown_rx,
        }
    }

    /// Run the worker until shutdown is signalled or the queue is closed.
    pub async fn run(mut self) {
        info!(worker = self.id, "Worker started");

        loop {
            let number = tokio::select! {
                biased;

                _ = flag_raised(&mut self.shutdown_rx) => {
                    info!(worker = self.id, "Worker received shutdown signal");
                    break;
                }

                number = self.ctx.queue.pop() => match number {
                    Some(number) => number,
                    None => {
                        info!(worker = self.id, "Order queue closed");
                        break;
                    }
                },
            };

            let Ok(event) = self.process(number).await;
            self.ctx.queue.release(number).await;

            match event {
                Some(event) => {
                    // The supervisor may already be gone during shutdown.
                    let _ = self.ctx.events.send(event).await;
                }
                None => {
                    info!(worker = self.id, order = %number, "Reconciliation cancelled by shutdown");
                    break;
                }
            }
        }

        info!(worker = self.id, "Worker shutdown complete");
    }

    async fn query(&self, number: OrderNumber) -> Result<Verdict, OracleError> {
        match tokio::time::timeout(self.ctx.oracle_timeout, self.ctx.oracle.query(number)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Transport(format!(
                "no answer within {}s",
                self.ctx.oracle_timeout.as_secs_f64()
            ))),
        }
    }
}

/// One reconciliation attempt for one order.
///
/// Returns `None` when shutdown interrupted the attempt before anything was
/// written to the ledger.
impl Processor<OrderNumber> for Worker {
    type Output = Option<WorkerEvent>;
    type Error = Infallible;

    async fn process(&self, number: OrderNumber) -> Result<Option<WorkerEvent>, Infallible> {
        let worker = self.id;
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::select! {
            biased;
            _ = flag_raised(&mut shutdown_rx) => return Ok(None),
            _ = self.ctx.backoff.wait_ready() => {}
        }

        debug!(worker, order = %number, "Querying accrual service");
        let queried = tokio::select! {
            biased;
            _ = flag_raised(&mut shutdown_rx) => return Ok(None),
            queried = self.query(number) => queried,
        };

        let verdict = match queried {
            Ok(verdict) => verdict,
            Err(OracleError::Overloaded) => {
                self.ctx.backoff.trip();
                return Ok(Some(WorkerEvent::Overloaded {
                    worker,
                    number,
                    cooldown: self.ctx.backoff.cooldown(),
                }));
            }
            Err(error) => {
                return Ok(Some(WorkerEvent::OracleFailed {
                    worker,
                    number,
                    error,
                }));
            }
        };

        let status = OrderStatus::from(verdict.status);
        let event = match self
            .ctx
            .ledger
            .apply_order_verdict(number, status, verdict.accrual)
            .await
        {
            Ok(outcome) => WorkerEvent::Applied {
                worker,
                number,
                status,
                outcome,
            },
            Err(e) => WorkerEvent::LedgerFailed {
                worker,
                number,
                error: e.to_string(),
            },
        };
        Ok(Some(event))
    }
}
