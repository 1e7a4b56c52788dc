// The handler contract consumed by the fetcher and the worker pool

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::result::ExternalTaskResult;
use crate::task::ExternalTask;

/// Default exclusive-ownership window for fetched tasks
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(30);

/// Default wait between retries when a handler does not override the backoff
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(60);

/// Business logic for one topic.
///
/// The fetcher consults `topic`, `variables` and `lock_duration` to build
/// its subscriptions; the worker pool enforces `lock_duration` as the
/// execution deadline and uses `retries` / `retry_timeout` for failure
/// accounting. `execute` must return exactly one result; any error it
/// bubbles is converted into a failure report.
#[async_trait]
pub trait ExternalTaskHandler: Send + Sync {
    /// Topic this handler subscribes to
    fn topic(&self) -> &str;

    /// Variable names to fetch with each task. `None` fetches all variables.
    fn variables(&self) -> Option<Vec<String>> {
        None
    }

    /// How long fetched tasks stay locked for this worker. Execution is
    /// cancelled when it exceeds this window.
    fn lock_duration(&self) -> Duration {
        DEFAULT_LOCK_DURATION
    }

    /// Initial retry count applied when a task without an engine-side retry
    /// counter fails. `None` means failures raise an incident immediately.
    fn retries(&self) -> Option<i32> {
        None
    }

    /// Wait before a failed task becomes fetchable again, given the number
    /// of retries that remain.
    fn retry_timeout(&self, retries_left: i32) -> Duration {
        let _ = retries_left;
        DEFAULT_RETRY_TIMEOUT
    }

    /// Execute the task. The cancellation token fires when the lock
    /// duration elapses or the worker shuts down; long-running handlers
    /// should observe it.
    async fn execute(
        &self,
        task: ExternalTask,
        cancellation: CancellationToken,
    ) -> anyhow::Result<ExternalTaskResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl ExternalTaskHandler for NoopHandler {
        fn topic(&self) -> &str {
            "noop"
        }

        async fn execute(
            &self,
            _task: ExternalTask,
            _cancellation: CancellationToken,
        ) -> anyhow::Result<ExternalTaskResult> {
            Ok(ExternalTaskResult::complete())
        }
    }

    #[test]
    fn contract_defaults() {
        let handler = NoopHandler;
        assert_eq!(handler.lock_duration(), Duration::from_secs(30));
        assert_eq!(handler.retries(), None);
        assert_eq!(handler.retry_timeout(3), Duration::from_secs(60));
        assert!(handler.variables().is_none());
    }
}
