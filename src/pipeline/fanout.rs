//! Bounded Fan-Out Executor
//!
//! Runs independent per-unit tasks on a bounded pool and collects results
//! keyed by unit. Results arrive in completion order, but the keyed map makes
//! the outcome independent of that order.
//!
//! A failing unit never cancels its siblings: every submitted unit runs to
//! completion and each failure is logged with its unit key. If any unit
//! failed, the first failure observed is returned and no partial map is
//! handed back.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::types::{ReportError, Result};

/// Execute `task` for every unit with at most `pool_size` in flight
pub async fn fan_out<K, T, F, Fut>(
    units: Vec<K>,
    pool_size: usize,
    task: F,
) -> Result<BTreeMap<K, T>>
where
    K: Clone + Ord + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = units.len();
    let pool_size = pool_size.max(1);
    debug!(units = total, pool_size, "Fan-out started");

    let mut stream = stream::iter(units)
        .map(|unit| {
            let key = unit.clone();
            let work = task(unit);
            async move { (key, work.await) }
        })
        .buffer_unordered(pool_size);

    let mut results = BTreeMap::new();
    let mut first_error: Option<(K, ReportError)> = None;

    while let Some((key, outcome)) = stream.next().await {
        match outcome {
            Ok(value) => {
                results.insert(key, value);
            }
            Err(e) => {
                warn!(unit = %key, error = %e, "Fan-out unit failed");
                if first_error.is_none() {
                    first_error = Some((key, e));
                }
            }
        }
    }

    if let Some((key, e)) = first_error {
        return Err(ReportError::FanOut {
            unit: key.to_string(),
            message: e.to_string(),
        });
    }

    debug!(units = total, "Fan-out joined");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sections(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Section {}", i)).collect()
    }

    #[tokio::test]
    async fn test_all_keys_present_regardless_of_completion_order() {
        let units = sections(5);

        let results = fan_out(units.clone(), 2, |title: String| async move {
            // Later units finish first
            let index: u64 = title.trim_start_matches("Section ").parse().unwrap();
            tokio::time::sleep(Duration::from_millis(50 - index * 10)).await;
            Ok(format!("draft of {}", title))
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 5);
        for title in &units {
            assert_eq!(results[title], format!("draft of {}", title));
        }
    }

    #[tokio::test]
    async fn test_pool_size_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = fan_out(sections(8), 3, |_title: String| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let completed = Arc::new(AtomicUsize::new(0));

        let result = fan_out(sections(5), 2, |title: String| {
            let completed = Arc::clone(&completed);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                if title == "Section 1" {
                    Err(ReportError::generation("draft rejected"))
                } else {
                    Ok(title)
                }
            }
        })
        .await;

        assert_eq!(completed.load(Ordering::SeqCst), 5);
        match result {
            Err(ReportError::FanOut { unit, message }) => {
                assert_eq!(unit, "Section 1");
                assert!(message.contains("draft rejected"));
            }
            other => panic!("expected fan-out error, got {:?}", other.map(|m| m.len())),
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results = fan_out(Vec::<String>::new(), 4, |_t: String| async { Ok(1) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
