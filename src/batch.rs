//! Bounded fan-out over independent units of work

use crate::Result;
use futures_util::stream::{self, StreamExt};
use std::future::Future;

/// Run `task` for every item, at most `concurrency` at a time, and collect
/// each item's own result.
///
/// Items are pulled lazily as slots free up. Results come back in completion
/// order, not input order. One item failing never stops the others.
pub async fn run_batch<I, K, T, F, Fut>(items: I, concurrency: usize, task: F) -> Vec<(K, Result<T>)>
where
    I: IntoIterator<Item = K>,
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(items)
        .map(|item| {
            let key = item.clone();
            let fut = task(item);
            async move { (key, fut.await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MirrorError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failures_stay_per_item() {
        let results = run_batch(1..=4, 2, |n| async move {
            if n % 2 == 0 {
                Err(MirrorError::Config(format!("even {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(results.len(), 4);
        let mut ok: Vec<i32> = results
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok().copied())
            .collect();
        ok.sort();
        assert_eq!(ok, vec![10, 30]);
        assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_cap() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = run_batch(0..10, 3, |_| {
            let running = &running;
            let peak = &peak;
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(results.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let results = run_batch(vec!["a"], 0, |s| async move { Ok(s.len()) }).await;
        assert_eq!(results[0].1.as_ref().unwrap(), &1);
    }
}
