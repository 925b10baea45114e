//! Cancellable Timers
//!
//! Background activities (keepalive ping, catalog refresh, idle-demand
//! sweep) run on timers spawned here. Each timer returns a `TimerHandle`;
//! `cancel()` stops it and no callback starts afterwards.
//!
//! - `every`: fixed wall-clock period, first tick one period after spawn.
//! - `adaptive`: each run returns the delay until the next run.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a running timer.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    cancel: CancellationToken,
}

impl TimerHandle {
    /// Stop the timer. Calling this more than once is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check whether the timer was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `tick` every `period`, starting one period from now.
///
/// Missed ticks are skipped rather than bursted.
#[must_use = "dropping the handle cancels the timer"]
pub fn every<F>(period: Duration, mut tick: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = interval.tick() => {
                    if token.is_cancelled() {
                        break;
                    }
                    tick();
                }
            }
        }
        tracing::trace!("Periodic timer stopped");
    });

    TimerHandle { cancel }
}

/// Run `run` after `initial_delay`, then again after whatever delay each run
/// returns.
///
/// A cancellation while `run` is in flight drops its future.
#[must_use = "dropping the handle cancels the timer"]
pub fn adaptive<F, Fut>(initial_delay: Duration, mut run: F) -> TimerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Duration> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        let mut delay = initial_delay;
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            delay = tokio::select! {
                biased;
                () = token.cancelled() => break,
                next = run() => next,
            };
        }
        tracing::trace!("Adaptive timer stopped");
    });

    TimerHandle { cancel }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn every_ticks_on_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = every(Duration::from_secs(4), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(3_900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(8_200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires_again() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = every(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.cancel();
        handle.cancel();
        let fired = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), fired);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        drop(every(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn adaptive_uses_returned_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = adaptive(Duration::ZERO, move || {
            let counter = Arc::clone(&counter);
            async move {
                let runs = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if runs < 3 {
                    Duration::from_secs(10)
                } else {
                    Duration::from_secs(3_600)
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
    }
}
