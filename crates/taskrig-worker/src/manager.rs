// Worker-pool loop: read, execute under the lock deadline, report, release
//
// Each dequeued task produces exactly one report. A missing handler, a
// handler error and a lock-duration timeout all become failure reports; the
// engine owns what happens next (retry or incident). Reporting errors are
// logged and the loop continues, since the engine resolves an unreported
// task itself once the lock expires. The permit is returned after the
// report, successful or not.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;

use taskrig_core::protocol::{
    BpmnErrorRequest, CompleteRequest, FailRequest, LockedExternalTask, VariableDto,
};
use taskrig_core::{
    ExternalTask, ExternalTaskHandler, ExternalTaskResult, Result, Variable, WorkerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::channel::WorkChannel;
use crate::client::EngineApi;
use crate::registry::HandlerRegistry;

#[derive(Clone)]
pub struct Manager {
    config: Arc<WorkerConfig>,
    client: Arc<dyn EngineApi>,
    channel: Arc<WorkChannel>,
    registry: Arc<HandlerRegistry>,
}

impl Manager {
    pub fn new(
        config: Arc<WorkerConfig>,
        client: Arc<dyn EngineApi>,
        channel: Arc<WorkChannel>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            config,
            client,
            channel,
            registry,
        }
    }

    /// Run until shutdown. One of these loops exists per capacity slot.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let task = match self.channel.read(&shutdown).await {
                Ok(task) => task,
                Err(_) => break,
            };

            // the permit must come back and the loop must survive even if
            // processing unwinds
            let task_id = task.id;
            let processed = AssertUnwindSafe(self.process(task, &shutdown))
                .catch_unwind()
                .await;
            self.channel.release();

            if processed.is_err() {
                error!(task_id = %task_id, "task processing panicked");
            }
        }

        debug!(worker_id = %self.config.worker_id, "manager stopped");
    }

    pub(crate) async fn process(&self, task: LockedExternalTask, shutdown: &CancellationToken) {
        let handler = self.registry.get(&task.topic_name);

        let result = match &handler {
            Some(handler) => self.execute(handler, &task, shutdown).await,
            None => {
                warn!(
                    task_id = %task.id,
                    topic = %task.topic_name,
                    "no handler registered for fetched topic"
                );
                ExternalTaskResult::failure(
                    format!("No handler found for topic '{}'", task.topic_name),
                    "",
                )
            }
        };

        if let Err(err) = self.report(&task, handler.as_deref(), result).await {
            error!(
                task_id = %task.id,
                topic = %task.topic_name,
                error = %err,
                "failed to report task result; the lock will expire on the engine side"
            );
        }
    }

    /// Run the handler under its lock-duration deadline. The handler gets a
    /// child token so a timeout or shutdown cancels exactly this execution.
    async fn execute(
        &self,
        handler: &Arc<dyn ExternalTaskHandler>,
        task: &LockedExternalTask,
        shutdown: &CancellationToken,
    ) -> ExternalTaskResult {
        let view = ExternalTask::from_locked(task);
        let scope = shutdown.child_token();
        let lock_duration = handler.lock_duration();

        debug!(task_id = %task.id, topic = %task.topic_name, "executing external task");

        // handlers are business code; a panic must become a failure report,
        // not kill the loop
        let execution = AssertUnwindSafe(handler.execute(view, scope.clone())).catch_unwind();

        match tokio::time::timeout(lock_duration, execution).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Err(panic)) => {
                let message = panic_text(panic.as_ref());
                warn!(
                    task_id = %task.id,
                    topic = %task.topic_name,
                    panic = %message,
                    "handler panicked"
                );
                ExternalTaskResult::failure(message.clone(), message)
            }
            Ok(Ok(Err(err))) => {
                warn!(
                    task_id = %task.id,
                    topic = %task.topic_name,
                    error = %err,
                    "handler returned an error"
                );
                ExternalTaskResult::failure(err.to_string(), format!("{err:?}"))
            }
            Err(_) => {
                scope.cancel();
                warn!(
                    task_id = %task.id,
                    topic = %task.topic_name,
                    lock_duration_ms = lock_duration.as_millis() as u64,
                    "task execution exceeded the lock duration"
                );
                ExternalTaskResult::failure(
                    "The task execution timed out",
                    format!(
                        "The task execution did not complete within the lock duration of {} milliseconds",
                        lock_duration.as_millis()
                    ),
                )
            }
        }
    }

    async fn report(
        &self,
        task: &LockedExternalTask,
        handler: Option<&dyn ExternalTaskHandler>,
        result: ExternalTaskResult,
    ) -> Result<()> {
        // the engine expects the id the task is locked under, as it fetched it
        let worker_id = task.worker_id.clone();

        match result {
            ExternalTaskResult::Complete {
                variables,
                local_variables,
            } => {
                let request = CompleteRequest {
                    worker_id,
                    variables: encode(variables),
                    local_variables: encode(local_variables),
                };
                self.client.complete(task.id, &request).await
            }

            ExternalTaskResult::Failure {
                error_message,
                error_details,
                variables,
                local_variables,
            } => {
                let (retries, retry_timeout) = failure_retries(task, handler);
                let request = FailRequest {
                    worker_id,
                    error_message,
                    error_details,
                    variables: encode(variables),
                    local_variables: encode(local_variables),
                    retries,
                    retry_timeout,
                };
                self.client.fail(task.id, &request).await
            }

            ExternalTaskResult::BpmnError {
                error_code,
                error_message,
                variables,
            } => {
                let request = BpmnErrorRequest {
                    worker_id,
                    error_code,
                    error_message,
                    variables: encode(variables),
                };
                self.client.bpmn_error(task.id, &request).await
            }
        }
    }
}

/// Human-readable text of a panic payload. `panic!` with a message produces
/// a `&str` or a `String`; anything else has no portable representation.
fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "The task handler panicked".to_owned()
    }
}

/// Retry accounting for a failure report. A task that already carries an
/// engine-side counter is decremented; a first-time failure starts from the
/// handler's initial count. The backoff is only sent while retries remain,
/// since the engine raises an incident at zero.
fn failure_retries(
    task: &LockedExternalTask,
    handler: Option<&dyn ExternalTaskHandler>,
) -> (Option<i32>, Option<u64>) {
    let retries = task
        .retries
        .map(|left| left - 1)
        .or_else(|| handler.and_then(|h| h.retries()));

    let retry_timeout = match retries {
        Some(left) if left > 0 => {
            let backoff = handler
                .map(|h| h.retry_timeout(left))
                .unwrap_or(Duration::ZERO);
            Some(backoff.as_millis() as u64)
        }
        _ => None,
    };

    (retries, retry_timeout)
}

fn encode(variables: Option<HashMap<String, Variable>>) -> Option<HashMap<String, VariableDto>> {
    variables.map(|variables| {
        variables
            .iter()
            .map(|(name, variable)| (name.clone(), variable.to_dto()))
            .collect()
    })
}
