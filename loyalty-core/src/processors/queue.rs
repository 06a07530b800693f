//! Bounded, de-duplicated queue of order numbers awaiting reconciliation.

use super::flag_raised;
use crate::entities::OrderNumber;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("order queue is closed")]
pub struct QueueClosed;

/// FIFO queue shared by the discovery ticker (producer) and all workers
/// (consumers).
///
/// A number stays tracked from [`push`](OrderQueue::push) until the worker
/// that took it calls [`release`](OrderQueue::release), so an order is never
/// queued or reconciled twice at the same time. `push` waits while the
/// queue is full.
pub struct OrderQueue {
    tx: mpsc::Sender<OrderNumber>,
    rx: Mutex<mpsc::Receiver<OrderNumber>>,
    tracked: Mutex<HashSet<OrderNumber>>,
    closed: watch::Sender<bool>,
}

impl OrderQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            tracked: Mutex::new(HashSet::new()),
            closed: watch::channel(false).0,
        }
    }

    /// Enqueue `number` unless it is already queued or in flight.
    ///
    /// Returns `Ok(false)` for a duplicate. Cancel-safe: a push dropped while
    /// waiting for room leaves nothing behind.
    pub async fn push(&self, number: OrderNumber) -> Result<bool, QueueClosed> {
        if self.is_closed() {
            return Err(QueueClosed);
        }
        if self.tracked.lock().await.contains(&number) {
            return Ok(false);
        }
        let mut closed = self.closed.subscribe();
        let permit = tokio::select! {
            biased;
            _ = flag_raised(&mut closed) => return Err(QueueClosed),
            permit = self.tx.reserve() => permit.map_err(|_| QueueClosed)?,
        };
        if !self.tracked.lock().await.insert(number) {
            return Ok(false);
        }
        permit.send(number);
        Ok(true)
    }

    /// Take the next number, waiting for one. `None` once the queue is
    /// closed; numbers still buffered at that point are dropped.
    pub async fn pop(&self) -> Option<OrderNumber> {
        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;
            _ = flag_raised(&mut closed) => None,
            number = async { self.rx.lock().await.recv().await } => number,
        }
    }

    /// Forget `number` so that it can be queued again.
    pub async fn release(&self, number: OrderNumber) {
        self.tracked.lock().await.remove(&number);
    }

    /// Close the queue: pending and future `push`/`pop` calls return
    /// immediately.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub async fn tracked_len(&self) -> usize {
        self.tracked.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn number(raw: &str) -> OrderNumber {
        OrderNumber::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped_until_released() {
        let queue = OrderQueue::new(4);
        let n = number("4539088167512356");

        assert_eq!(queue.push(n).await, Ok(true));
        assert_eq!(queue.push(n).await, Ok(false));
        assert_eq!(queue.pop().await, Some(n));

        // Popped but not released: still in flight.
        assert_eq!(queue.push(n).await, Ok(false));
        queue.release(n).await;
        assert_eq!(queue.push(n).await, Ok(true));
        assert_eq!(queue.tracked_len().await, 1);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = OrderQueue::new(4);
        let numbers = ["4539088167512356", "3536137811022331", "12345678903"].map(number);
        for n in numbers {
            queue.push(n).await.unwrap();
        }
        for n in numbers {
            assert_eq!(queue.pop().await, Some(n));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_waits_for_room() {
        let queue = Arc::new(OrderQueue::new(1));
        queue.push(number("4539088167512356")).await.unwrap();

        let blocked = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(number("3536137811022331")).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!blocked.is_finished());

        assert_eq!(queue.pop().await, Some(number("4539088167512356")));
        assert_eq!(blocked.await.unwrap(), Ok(true));
        assert_eq!(queue.pop().await, Some(number("3536137811022331")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_push_is_not_tracked() {
        let queue = OrderQueue::new(1);
        queue.push(number("4539088167512356")).await.unwrap();

        let n = number("3536137811022331");
        let timed_out = tokio::time::timeout(Duration::from_secs(1), queue.push(n)).await;
        assert!(timed_out.is_err());
        assert_eq!(queue.tracked_len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_wakes_waiting_consumers_and_producers() {
        let queue = Arc::new(OrderQueue::new(1));
        queue.push(number("4539088167512356")).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(number("3536137811022331")).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.close();

        assert_eq!(producer.await.unwrap(), Err(QueueClosed));
        assert_eq!(queue.pop().await, None);
        assert_eq!(queue.push(number("12345678903")).await, Err(QueueClosed));
    }
}
