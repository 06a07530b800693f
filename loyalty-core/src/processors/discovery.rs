//! DiscoveryTicker processor.
//!
//! On every tick the DiscoveryTicker walks all orders still awaiting a final
//! verdict (`NEW` or `PROCESSING`) page by page, oldest first, and pushes
//! their numbers into the `OrderQueue`. A full queue blocks the walk. This is the only retry mechanism of the engine:
//! orders left pending by an overload, a timeout or a failed ledger write
//! are picked up again here.

use super::{OrderQueue, flag_raised};
use crate::entities::orders::PendingOrder;
use crate::ledger::Ledger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Number of pending orders read from the ledger per page.
pub const DISCOVERY_PAGE_SIZE: usize = 1000;

pub struct DiscoveryTicker {
    ledger: Arc<dyn Ledger>,
    queue: Arc<OrderQueue>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

/// Why a discovery cycle ended early.
enum CycleEnd {
    Shutdown,
    QueueClosed,
}

impl DiscoveryTicker {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        queue: Arc<OrderQueue>,
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            queue,
            interval,
            shutdown_rx,
        }
    }

    /// Run until shutdown, then close the queue so idle workers stop too.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "DiscoveryTicker started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = flag_raised(&mut self.shutdown_rx) => {
                    info!("DiscoveryTicker received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    match self.discover().await {
                        Ok(()) => {}
                        Err(CycleEnd::Shutdown) => {
                            info!("DiscoveryTicker received shutdown signal");
                            break;
                        }
                        Err(CycleEnd::QueueClosed) => {
                            info!("Order queue closed");
                            break;
                        }
                    }
                }
            }
        }

        self.queue.close();
        info!("DiscoveryTicker shutdown complete");
    }

    /// One discovery cycle. A failed ledger read ends the cycle early; the
    /// next cycle starts over from the oldest order.
    async fn discover(&mut self) -> Result<(), CycleEnd> {
        let mut after = None;
        let mut found = 0usize;
        let mut queued = 0usize;

        loop {
            let page = match self.ledger.pending_orders(after, DISCOVERY_PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    error!(error = %e, found, "Failed to read pending orders, cutting cycle short");
                    return Ok(());
                }
            };
            let last_page = page.len() < DISCOVERY_PAGE_SIZE;
            after = page.last().map(PendingOrder::cursor);
            found += page.len();

            for order in page {
                let pushed = tokio::select! {
                    biased;
                    _ = flag_raised(&mut self.shutdown_rx) => return Err(CycleEnd::Shutdown),
                    pushed = self.queue.push(order.number) => pushed,
                };
                match pushed {
                    Ok(true) => queued += 1,
                    Ok(false) => {}
                    Err(_) => return Err(CycleEnd::QueueClosed),
                }
            }

            if last_page {
                break;
            }
        }

        debug!(found, queued, "Discovery cycle complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::orders::PendingCursor;
    use crate::entities::{OrderNumber, OrderStatus};
    use crate::ledger::{
        Balance, CreateUserOutcome, LedgerError, MemoryLedger, RegisterOrderOutcome,
        VerdictOutcome, WithdrawOutcome,
    };
    use crate::processors::worker::tests::number;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use crate::utils::luhn;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    async fn ledger_with_orders(numbers: &[OrderNumber]) -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        let CreateUserOutcome::Created(user) = ledger.create_user("alice", "hash").await.unwrap()
        else {
            panic!("fresh ledger");
        };
        for n in numbers {
            ledger.register_order(user.id, *n).await.unwrap();
        }
        ledger
    }

    #[tokio::test(start_paused = true)]
    async fn test_queues_only_pending_orders_once() {
        let numbers = ["4539088167512356", "3536137811022331", "12345678903"].map(number);
        let ledger = ledger_with_orders(&numbers).await;
        ledger
            .apply_order_verdict(numbers[1], OrderStatus::Processed, Some(Decimal::ONE))
            .await
            .unwrap();
        ledger
            .apply_order_verdict(numbers[2], OrderStatus::Processing, None)
            .await
            .unwrap();

        let queue = Arc::new(OrderQueue::new(8));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            DiscoveryTicker::new(ledger, queue.clone(), Duration::from_secs(5), shutdown_rx).run(),
        );

        // Three cycles; nothing is popped, so the numbers stay tracked.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(queue.tracked_len().await, 2);
        assert_eq!(queue.pop().await, Some(numbers[0]));
        assert_eq!(queue.pop().await, Some(numbers[2]));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(queue.is_closed());
    }

    /// The `i`-th of a run of distinct Luhn-valid order numbers.
    fn nth_number(i: u64) -> OrderNumber {
        let base = (1_000_000 + i) * 10;
        let valid = (base..base + 10).find(|n| luhn::is_valid(*n)).unwrap();
        OrderNumber::parse(&valid.to_string()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_pending_order_is_queued_beyond_one_page() {
        let total = DISCOVERY_PAGE_SIZE as u64 * 2 + 1;
        let numbers: Vec<OrderNumber> = (0..total).map(nth_number).collect();
        let ledger = ledger_with_orders(&numbers).await;

        // Small queue: the walk over all pages has to wait for the consumer.
        let queue = Arc::new(OrderQueue::new(8));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut seen = HashSet::new();
                while let Some(n) = queue.pop().await {
                    seen.insert(n);
                    queue.release(n).await;
                }
                seen
            })
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            DiscoveryTicker::new(ledger, queue.clone(), Duration::from_secs(5), shutdown_rx).run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let seen = consumer.await.unwrap();
        assert_eq!(seen.len(), numbers.len());
        assert!(seen.contains(numbers.last().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_on_full_queue_still_shuts_down() {
        let numbers = ["4539088167512356", "3536137811022331", "12345678903"].map(number);
        let ledger = ledger_with_orders(&numbers).await;
        let queue = Arc::new(OrderQueue::new(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            DiscoveryTicker::new(ledger, queue.clone(), Duration::from_secs(5), shutdown_rx).run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.tracked_len().await, 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    /// Ledger whose pending-order read fails on the first call.
    struct FlakyLedger {
        inner: MemoryLedger,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl Ledger for FlakyLedger {
        async fn create_user(&self, login: &str, hash: &str) -> Result<CreateUserOutcome, LedgerError> {
            self.inner.create_user(login, hash).await
        }
        async fn find_user_by_login(
            &self,
            login: &str,
        ) -> Result<Option<crate::entities::users::User>, LedgerError> {
            self.inner.find_user_by_login(login).await
        }
        async fn register_order(
            &self,
            user_id: Uuid,
            number: OrderNumber,
        ) -> Result<RegisterOrderOutcome, LedgerError> {
            self.inner.register_order(user_id, number).await
        }
        async fn list_orders(
            &self,
            user_id: Uuid,
        ) -> Result<Vec<crate::entities::orders::Order>, LedgerError> {
            self.inner.list_orders(user_id).await
        }
        async fn pending_orders(
            &self,
            after: Option<PendingCursor>,
            limit: usize,
        ) -> Result<Vec<PendingOrder>, LedgerError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(LedgerError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.pending_orders(after, limit).await
        }
        async fn apply_order_verdict(
            &self,
            number: OrderNumber,
            status: OrderStatus,
            accrual: Option<Decimal>,
        ) -> Result<VerdictOutcome, LedgerError> {
            self.inner.apply_order_verdict(number, status, accrual).await
        }
        async fn withdraw(
            &self,
            user_id: Uuid,
            number: OrderNumber,
            amount: Decimal,
        ) -> Result<WithdrawOutcome, LedgerError> {
            self.inner.withdraw(user_id, number, amount).await
        }
        async fn list_withdrawals(
            &self,
            user_id: Uuid,
        ) -> Result<Vec<crate::entities::withdrawals::Withdrawal>, LedgerError> {
            self.inner.list_withdrawals(user_id).await
        }
        async fn balance(&self, user_id: Uuid) -> Result<Balance, LedgerError> {
            self.inner.balance(user_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_read_skips_cycle() {
        let ledger = Arc::new(FlakyLedger {
            inner: MemoryLedger::new(),
            reads: AtomicUsize::new(0),
        });
        let CreateUserOutcome::Created(user) = ledger.create_user("alice", "hash").await.unwrap()
        else {
            panic!("fresh ledger");
        };
        let n = number("4539088167512356");
        ledger.register_order(user.id, n).await.unwrap();

        let queue = Arc::new(OrderQueue::new(8));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(
            DiscoveryTicker::new(ledger.clone(), queue.clone(), Duration::from_secs(5), shutdown_rx)
                .run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.tracked_len().await, 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(queue.pop().await, Some(n));
        assert_eq!(ledger.reads.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
