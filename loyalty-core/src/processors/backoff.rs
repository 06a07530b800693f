//! Pool-wide pause on accrual service overload.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;

/// Shared "paused until" deadline.
///
/// Any worker that sees an overload trips the backoff; every worker waits in
/// [`Backoff::wait_ready`] before each query, so the whole pool honours the
/// pause, not only the worker that observed it. Resuming needs no
/// coordination: each worker wakes up on its own once the deadline passes.
#[derive(Clone)]
pub struct Backoff {
    paused_until: Arc<watch::Sender<Option<Instant>>>,
    cooldown: Duration,
}

impl Backoff {
    pub fn new(cooldown: Duration) -> Self {
        let (paused_until, _) = watch::channel(None);
        Self {
            paused_until: Arc::new(paused_until),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Pause the pool for one cooldown from now.
    ///
    /// A deadline already further in the future is kept.
    pub fn trip(&self) -> Instant {
        let deadline = Instant::now() + self.cooldown;
        self.paused_until.send_modify(|until| match until {
            Some(current) if *current >= deadline => {}
            _ => *until = Some(deadline),
        });
        warn!(cooldown_secs = self.cooldown.as_secs(), "Pool paused after overload");
        self.paused_until().unwrap_or(deadline)
    }

    /// Deadline of the current pause, if one is still running.
    pub fn paused_until(&self) -> Option<Instant> {
        let until = *self.paused_until.borrow();
        until.filter(|deadline| *deadline > Instant::now())
    }

    /// Wait until no pause is running.
    ///
    /// Re-checks after every sleep because the pause may have been extended
    /// in the meantime.
    pub async fn wait_ready(&self) {
        while let Some(deadline) = self.paused_until() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_without_pause_returns_immediately() {
        let backoff = Backoff::new(Duration::from_secs(120));
        let start = Instant::now();
        backoff.wait_ready().await;
        assert_eq!(Instant::now(), start);
        assert_eq!(backoff.paused_until(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_pauses_every_clone() {
        let backoff = Backoff::new(Duration::from_secs(120));
        let other = backoff.clone();
        let start = Instant::now();

        let deadline = backoff.trip();
        assert_eq!(deadline, start + Duration::from_secs(120));
        assert_eq!(other.paused_until(), Some(deadline));

        other.wait_ready().await;
        assert_eq!(Instant::now(), deadline);
        assert_eq!(backoff.paused_until(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_during_pause_extends_it() {
        let backoff = Backoff::new(Duration::from_secs(120));
        let start = Instant::now();
        backoff.trip();

        let waiter = {
            let backoff = backoff.clone();
            tokio::spawn(async move {
                backoff.wait_ready().await;
                Instant::now()
            })
        };

        tokio::time::sleep(Duration::from_secs(60)).await;
        backoff.trip();

        let resumed = waiter.await.unwrap();
        assert_eq!(resumed, start + Duration::from_secs(180));
    }
}
