use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs `task` now and then every `interval` until `cancel` fires.
///
/// A failing tick is logged and the loop carries on. Returns the number of
/// ticks that ran.
pub async fn poll_every<F, Fut>(interval: Duration, cancel: &CancellationToken, mut task: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(?interval, "Polling started");
    let mut ticks = 0;
    loop {
        tokio::select! {
            outcome = task() => {
                ticks += 1;
                if let Err(e) = outcome {
                    error!(error = %e, tick = ticks, "Polling tick failed");
                }
            }
            _ = cancel.cancelled() => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }
    info!(ticks, "Polling stopped");
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_failing_ticks_do_not_stop_the_loop() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        let ticks = {
            let stopper = cancel.clone();
            let attempts = Arc::clone(&attempts);
            poll_every(Duration::from_secs(60), &cancel, move || {
                let attempts = Arc::clone(&attempts);
                let stopper = stopper.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if n == 3 {
                        stopper.cancel();
                    }
                    if n % 2 == 1 {
                        Err(anyhow!("provider unavailable"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
        };

        assert_eq!(ticks, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_interval_between_ticks() {
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(25)).await;
                cancel.cancel();
            })
        };

        let recorded = Arc::clone(&stamps);
        poll_every(Duration::from_secs(10), &cancel, move || {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(started.elapsed().as_secs());
                Ok(())
            }
        })
        .await;
        canceller.await.unwrap();

        let stamps = stamps.lock().unwrap().clone();
        assert_eq!(stamps, vec![0, 10, 20]);
    }
}
