use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// C9: a single repeating timer. Late firings do not accumulate — at most
/// one tick is ever "owed" (`MissedTickBehavior::Delay`) — and the timer is
/// cancellable on shutdown (§4.9, §5). Used both for the `process_interval`
/// tick and, once per aggregator, for `aggregation_window` flushes.
pub async fn run_ticker<F, Fut>(period: Duration, stop: CancellationToken, mut on_tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so startup doesn't race the
    // rest of the wiring before it's ready.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = interval.tick() => on_tick().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let count = Arc::new(AtomicU32::new(0));
        let stop = CancellationToken::new();
        let stop_clone = stop.clone();
        let count_clone = count.clone();

        let handle = tokio::spawn(async move {
            run_ticker(Duration::from_millis(10), stop_clone, || {
                let count = count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::advance(Duration::from_millis(35)).await;
        stop.cancel();
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
