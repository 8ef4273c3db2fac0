//! Call Timeouts
//!
//! Wraps a single external call in a deadline. The retry policy sits outside
//! this wrapper, so a timed-out attempt counts as one failed attempt.
//!
//! ```ignore
//! let text = with_timeout(Duration::from_secs(30), provider.generate(prompt), "generate").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{ReportError, Result};

/// Execute an async operation with a timeout
///
/// Returns `ReportError::Timeout` if the operation doesn't complete in time.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ReportError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ReportError>("text") },
            "generate",
        )
        .await;
        assert_eq!(result.unwrap(), "text");
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ReportError>(())
            },
            "search",
        )
        .await;
        match result {
            Err(ReportError::Timeout { operation, .. }) => assert_eq!(operation, "search"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(ReportError::generation("backend down")) },
            "generate",
        )
        .await;
        assert!(matches!(result, Err(ReportError::Generation(_))));
    }
}
