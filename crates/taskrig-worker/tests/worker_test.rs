// End-to-end worker tests against a mocked engine

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use taskrig_worker::{
    ExternalTask, ExternalTaskHandler, ExternalTaskResult, HandlerRegistry, Variable, Worker,
    WorkerConfig,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TASK_ID: &str = "0191e7a4-24b1-7f2e-b79c-000000000001";

fn config(server: &MockServer) -> WorkerConfig {
    WorkerConfig::new("it-worker", server.uri())
        .with_maximum_tasks(2)
        .with_response_timeout_secs(1)
        .with_fetch_interval(Duration::from_millis(10))
        .with_request_retry(1, Duration::from_millis(10))
}

/// Serve one task on the first fetch, an empty list afterwards.
async fn mount_single_task_fetch(server: &MockServer, task: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task])))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/external-task/fetchAndLock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn run_briefly(worker: Worker) {
    let worker = Arc::new(worker);
    let running = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    worker.shutdown();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("worker did not stop")
        .unwrap();
}

struct EchoHandler;

#[async_trait]
impl ExternalTaskHandler for EchoHandler {
    fn topic(&self) -> &str {
        "echo"
    }

    fn variables(&self) -> Option<Vec<String>> {
        Some(vec!["x".to_owned()])
    }

    fn lock_duration(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn execute(
        &self,
        task: ExternalTask,
        _cancellation: CancellationToken,
    ) -> anyhow::Result<ExternalTaskResult> {
        let x = task
            .variable("x")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned();

        let mut output = HashMap::new();
        output.insert("echoed".to_owned(), Variable::from(x));
        Ok(ExternalTaskResult::complete().with_variables(output))
    }
}

#[tokio::test]
async fn fetched_task_is_executed_and_completed() {
    let server = MockServer::start().await;

    mount_single_task_fetch(
        &server,
        json!({
            "id": TASK_ID,
            "topicName": "echo",
            "workerId": "it-worker",
            "variables": {
                "x": {"value": "<root/>", "type": "String"}
            }
        }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(format!("/external-task/{TASK_ID}/complete")))
        .and(body_partial_json(json!({
            "workerId": "it-worker",
            "variables": {
                "echoed": {"value": "<root/>", "type": "String"}
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HandlerRegistry::new().register(EchoHandler);
    let worker = Worker::new(config(&server), registry).unwrap();
    run_briefly(worker).await;
}

#[tokio::test]
async fn failing_handler_reports_decremented_retries() {
    struct FlakyHandler;

    #[async_trait]
    impl ExternalTaskHandler for FlakyHandler {
        fn topic(&self) -> &str {
            "flaky"
        }

        fn retry_timeout(&self, _retries_left: i32) -> Duration {
            Duration::from_secs(2)
        }

        async fn execute(
            &self,
            _task: ExternalTask,
            _cancellation: CancellationToken,
        ) -> anyhow::Result<ExternalTaskResult> {
            anyhow::bail!("downstream unavailable")
        }
    }

    let server = MockServer::start().await;

    mount_single_task_fetch(
        &server,
        json!({
            "id": TASK_ID,
            "topicName": "flaky",
            "workerId": "it-worker",
            "retries": 4
        }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(format!("/external-task/{TASK_ID}/failure")))
        .and(body_partial_json(json!({
            "workerId": "it-worker",
            "errorMessage": "downstream unavailable",
            "retries": 3,
            "retryTimeout": 2000
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HandlerRegistry::new().register(FlakyHandler);
    let worker = Worker::new(config(&server), registry).unwrap();
    run_briefly(worker).await;
}

#[tokio::test]
async fn unknown_topic_is_failed_without_a_handler() {
    struct OtherHandler;

    #[async_trait]
    impl ExternalTaskHandler for OtherHandler {
        fn topic(&self) -> &str {
            "known"
        }

        async fn execute(
            &self,
            _task: ExternalTask,
            _cancellation: CancellationToken,
        ) -> anyhow::Result<ExternalTaskResult> {
            Ok(ExternalTaskResult::complete())
        }
    }

    let server = MockServer::start().await;

    // the engine hands out a topic nothing subscribed to
    mount_single_task_fetch(
        &server,
        json!({
            "id": TASK_ID,
            "topicName": "surprise",
            "workerId": "it-worker"
        }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/external-task/.+/failure$"))
        .and(body_partial_json(json!({
            "errorMessage": "No handler found for topic 'surprise'",
            "errorDetails": ""
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let registry = HandlerRegistry::new().register(OtherHandler);
    let worker = Worker::new(config(&server), registry).unwrap();
    run_briefly(worker).await;
}
