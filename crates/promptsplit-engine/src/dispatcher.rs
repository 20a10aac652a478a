//! Order-preserving concurrent dispatch.
//!
//! Work items run with bounded concurrency; results land in index-keyed
//! slots, so output order always equals input order no matter which task
//! finishes first. A failed item leaves its slot at the default value and
//! the batch keeps going.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Map `inputs` through `op` with at most `max_workers` in flight.
///
/// The returned vector has exactly one slot per input, in input order. A slot
/// whose operation failed (or whose task panicked) holds `O::default()`.
pub async fn map_ordered<I, O, E, F, Fut>(inputs: Vec<I>, max_workers: usize, op: F) -> Vec<O>
where
    I: Send + 'static,
    O: Default + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(usize, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    let total = inputs.len();
    let mut slots: Vec<O> = std::iter::repeat_with(O::default).take(total).collect();
    if total == 0 {
        return slots;
    }

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let op = Arc::new(op);
    let mut tasks = JoinSet::new();

    for (index, item) in inputs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let op = Arc::clone(&op);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                // Semaphore is never closed while tasks are pending.
                return (index, None);
            };
            match op(index, item).await {
                Ok(output) => (index, Some(output)),
                Err(err) => {
                    warn!(index, error = %err, "work item failed, slot stays empty");
                    (index, None)
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Some(output))) => slots[index] = output,
            Ok((_, None)) => {}
            Err(err) => warn!(error = %err, "worker task did not complete"),
        }
    }

    debug!(total, "batch dispatch complete");
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_input_order_under_randomized_latency() {
        let inputs: Vec<usize> = (0..32).collect();
        let results: Vec<String> = map_ordered(inputs, 8, |_, n: usize| async move {
            let delay = rand::thread_rng().gen_range(0..20u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, String>(format!("item-{n}"))
        })
        .await;

        let expected: Vec<String> = (0..32).map(|n| format!("item-{n}")).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn failed_items_leave_default_slots() {
        let inputs: Vec<usize> = (0..6).collect();
        let results: Vec<Vec<usize>> = map_ordered(inputs, 3, |_, n: usize| async move {
            if n % 2 == 0 {
                Ok(vec![n, n + 100])
            } else {
                Err(format!("item {n} failed"))
            }
        })
        .await;

        assert_eq!(results.len(), 6);
        assert_eq!(results[0], vec![0, 100]);
        assert!(results[1].is_empty());
        assert_eq!(results[2], vec![2, 102]);
        assert!(results[3].is_empty());
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let inputs: Vec<usize> = (0..20).collect();
        let in_flight_clone = Arc::clone(&in_flight);
        let peak_clone = Arc::clone(&peak);

        let _: Vec<usize> = map_ordered(inputs, 4, move |_, n: usize| {
            let in_flight = Arc::clone(&in_flight_clone);
            let peak = Arc::clone(&peak_clone);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(n)
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results: Vec<u32> =
            map_ordered(Vec::<u32>::new(), 4, |_, n: u32| async move {
                Ok::<_, String>(n)
            })
            .await;
        assert!(results.is_empty());
    }
}
