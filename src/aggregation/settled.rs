//! Single-assignment value with a deadline, awaitable by any number of waiters.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};

/// The deadline passed before a value was resolved.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("deadline elapsed before the value was resolved")]
pub struct Expired;

type Slot<T> = watch::Sender<Option<Result<T, Expired>>>;

/// Resolves exactly once, either with a value or with [`Expired`] when the deadline passes.
///
/// The first settlement wins; later calls to [`SettledFuture::resolve`] are no-ops. The
/// deadline is enforced by a timer task that is aborted as soon as a value is resolved
/// or the future is dropped.
pub struct SettledFuture<T> {
    slot: Arc<Slot<T>>,
    deadline: Instant,
    timer: AbortHandle,
}

impl<T> SettledFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Must be called from within a Tokio runtime.
    pub fn new(deadline: Instant) -> Self {
        Self::with_expiry_hook(deadline, || {})
    }

    /// Like [`SettledFuture::new`], running `on_expire` once if the deadline wins.
    pub fn with_expiry_hook<F>(deadline: Instant, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (sender, _) = watch::channel(None);
        let slot = Arc::new(sender);
        let timer = tokio::spawn({
            let slot = Arc::clone(&slot);
            async move {
                sleep_until(deadline).await;
                if settle(&slot, Err(Expired)) {
                    on_expire();
                }
            }
        })
        .abort_handle();
        Self {
            slot,
            deadline,
            timer,
        }
    }

    /// Sets the value unless already settled. Returns whether this call won.
    pub fn resolve(&self, value: T) -> bool {
        let won = settle(&self.slot, Ok(value));
        if won {
            self.timer.abort();
        }
        won
    }

    /// Suspends until the future settles, then returns the shared outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Expired`] if the deadline passed first.
    pub async fn wait(&self) -> Result<T, Expired> {
        let mut receiver = self.slot.subscribe();
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone().unwrap_or(Err(Expired)),
            Err(_) => Err(Expired),
        };
        outcome
    }

    /// The outcome if already settled.
    pub fn settled(&self) -> Option<Result<T, Expired>> {
        self.slot.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Settled with a value rather than by expiry.
    pub fn is_resolved(&self) -> bool {
        matches!(*self.slot.borrow(), Some(Ok(_)))
    }

    pub const fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl<T> Drop for SettledFuture<T> {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// First writer wins.
fn settle<T>(slot: &Slot<T>, outcome: Result<T, Expired>) -> bool {
    slot.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(outcome);
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_resolve_wins() {
        let future = SettledFuture::new(Instant::now() + Duration::from_secs(5));
        assert!(future.resolve(1));
        assert!(future.is_resolved());
        assert!(!future.resolve(2));
        assert_eq!(future.wait().await, Ok(1));
        assert_eq!(future.settled(), Some(Ok(1)));
    }

    #[tokio::test]
    async fn test_many_waiters_observe_same_value() {
        let future = Arc::new(SettledFuture::new(Instant::now() + Duration::from_secs(5)));
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let future = Arc::clone(&future);
                tokio::spawn(async move { future.wait().await })
            })
            .collect();
        tokio::task::yield_now().await;
        assert!(future.resolve("done".to_string()));
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok("done".to_string()));
        }
        // Settled futures answer immediately.
        assert_eq!(future.wait().await, Ok("done".to_string()));
    }

    #[tokio::test]
    async fn test_expires_no_earlier_than_deadline() {
        let timeout = Duration::from_millis(100);
        let start = Instant::now();
        let future = SettledFuture::<u32>::new(start + timeout);
        assert!(!future.is_settled());
        assert_eq!(future.wait().await, Err(Expired));
        assert!(start.elapsed() >= timeout);
        assert!(future.is_settled());
        assert!(!future.is_resolved());
        assert!(!future.resolve(7));
        assert_eq!(future.wait().await, Err(Expired));
    }

    #[tokio::test]
    async fn test_expiry_hook_runs_once_and_only_on_expiry() {
        let expired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&expired);
        let future = SettledFuture::<u32>::with_expiry_hook(
            Instant::now() + Duration::from_millis(20),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(future.wait().await, Err(Expired));
        assert_eq!(expired.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&expired);
        let resolved = SettledFuture::with_expiry_hook(
            Instant::now() + Duration::from_millis(20),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(resolved.resolve(3));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(resolved.wait().await, Ok(3));
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_expiry() {
        let future = SettledFuture::<u32>::new(Instant::now() + Duration::from_secs(3600));
        let start = Instant::now();
        assert_eq!(future.wait().await, Err(Expired));
        assert!(start.elapsed() >= Duration::from_secs(3600));
    }
}
