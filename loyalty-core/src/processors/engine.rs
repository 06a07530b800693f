//! Reconciliation engine wiring.

use super::supervisor::SupervisorStats;
use super::worker::PoolContext;
use super::{Backoff, DiscoveryTicker, OrderQueue, Supervisor, Worker};
use crate::config::EngineConfig;
use crate::events::worker_event_channel;
use crate::ledger::Ledger;
use crate::oracle::AccrualOracle;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Start the workers, the discovery ticker and the supervisor.
    ///
    /// Everything stops once `shutdown_rx` turns `true`; await
    /// [`EngineHandle::join`] afterwards.
    pub fn spawn(
        ledger: Arc<dyn Ledger>,
        oracle: Arc<dyn AccrualOracle>,
        config: EngineConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> EngineHandle {
        let queue = Arc::new(OrderQueue::new(config.queue_capacity));
        let backoff = Backoff::new(config.overload_cooldown);
        let (events_tx, events_rx) = worker_event_channel();

        let supervisor = tokio::spawn(Supervisor::new(events_rx).run());

        let ctx = PoolContext {
            ledger: ledger.clone(),
            oracle,
            queue: queue.clone(),
            backoff: backoff.clone(),
            events: events_tx,
            oracle_timeout: config.oracle_timeout,
        };
        let workers = (0..config.workers)
            .map(|id| tokio::spawn(Worker::new(id, ctx.clone(), shutdown_rx.clone()).run()))
            .collect();
        // Workers hold the only event senders from here on.
        drop(ctx);

        let discovery = tokio::spawn(
            DiscoveryTicker::new(ledger, queue, config.discovery_interval, shutdown_rx).run(),
        );

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Reconciliation engine started"
        );

        EngineHandle {
            backoff,
            workers,
            discovery,
            supervisor,
        }
    }
}

pub struct EngineHandle {
    backoff: Backoff,
    workers: Vec<JoinHandle<()>>,
    discovery: JoinHandle<()>,
    supervisor: JoinHandle<SupervisorStats>,
}

impl EngineHandle {
    /// Pool-wide backoff of this engine.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Wait for every engine task to finish.
    pub async fn join(self) -> SupervisorStats {
        if let Err(e) = self.discovery.await {
            error!(error = %e, "DiscoveryTicker task failed");
        }
        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task failed");
            }
        }
        let stats = match self.supervisor.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Supervisor task failed");
                SupervisorStats::default()
            }
        };
        info!("Reconciliation engine stopped");
        stats
    }
}
