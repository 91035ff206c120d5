//! Serialises outbound calls to rate-limited providers.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Throttled call was cancelled")]
pub struct Cancelled;

/// A gate allowing one action at a time, with a minimum gap between the end
/// of one action and the start of the next.
///
/// Each instance has its own state; share it with `Arc` between every client
/// of the same downstream provider.
#[derive(Debug)]
pub struct RequestThrottle {
    gate: Mutex<()>,
    min_delay: Duration,
}

impl RequestThrottle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            gate: Mutex::new(()),
            min_delay,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Runs `action` once the gate is free. The gate is held for `min_delay`
    /// after the action completes. The output is returned untouched.
    pub async fn run<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.gate.lock().await;
        trace!("Throttle acquired");
        let output = action().await;
        tokio::time::sleep(self.min_delay).await;
        output
    }

    /// Like [`run`](Self::run), but gives up with [`Cancelled`] if `cancel`
    /// fires while waiting for the gate or while the action is running.
    pub async fn run_until<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        action: F,
    ) -> Result<T, Cancelled>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = tokio::select! {
            guard = self.gate.lock() => guard,
            _ = cancel.cancelled() => return Err(Cancelled),
        };
        trace!("Throttle acquired");
        let output = tokio::select! {
            output = action() => Ok(output),
            _ = cancel.cancelled() => Err(Cancelled),
        };
        // The gap is kept even for a cancelled action, the provider may
        // already have seen the request.
        tokio::time::sleep(self.min_delay).await;
        output
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_actions_never_overlap_and_keep_min_gap() {
        let delay = Duration::from_millis(100);
        let work = Duration::from_millis(30);
        let throttle = Arc::new(RequestThrottle::new(delay));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move {
                    throttle
                        .run(|| async move {
                            let start = Instant::now();
                            tokio::time::sleep(work).await;
                            (i, start, Instant::now())
                        })
                        .await
                })
            })
            .collect();

        let mut spans = Vec::new();
        for handle in handles {
            spans.push(handle.await.unwrap());
        }
        spans.sort_by_key(|(_, start, _)| *start);

        for pair in spans.windows(2) {
            let (_, prev_start, prev_end) = pair[0];
            let (_, next_start, _) = pair[1];
            assert!(next_start >= prev_end, "actions overlapped");
            assert!(next_start - prev_start >= delay);
            assert!(next_start - prev_end >= delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_pass_through_untouched() {
        let throttle = RequestThrottle::default();
        let result: Result<u32, String> = throttle.run(|| async { Err("boom".to_string()) }).await;
        assert_eq!(result, Err("boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_throttles_do_not_block_each_other() {
        let first = RequestThrottle::new(Duration::from_secs(60));
        let second = RequestThrottle::new(Duration::from_secs(60));

        let _guard = first.gate.lock().await;
        let started = Instant::now();
        second.run(|| async {}).await;
        assert_eq!(Instant::now() - started, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_gate() {
        let throttle = RequestThrottle::new(Duration::from_millis(10));
        let cancel = CancellationToken::new();

        let guard = throttle.gate.lock().await;
        cancel.cancel();
        let result = throttle.run_until(&cancel, || async { 42 }).await;
        assert_eq!(result, Err(Cancelled));
        drop(guard);

        let fresh = CancellationToken::new();
        let result = throttle.run_until(&fresh, || async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_action_runs() {
        let throttle = Arc::new(RequestThrottle::new(Duration::from_millis(10)));
        let cancel = CancellationToken::new();

        let task = {
            let throttle = Arc::clone(&throttle);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                throttle
                    .run_until(&cancel, || async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        1
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
        assert_eq!(task.await.unwrap(), Err(Cancelled));
    }
}
