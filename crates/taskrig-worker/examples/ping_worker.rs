// A minimal worker: subscribes to the "ping" topic and completes each task
// with a "pong" variable. Point ENGINE_URL at a running engine, create a
// process instance with an external task on that topic and watch the logs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taskrig_worker::{
    ExternalTask, ExternalTaskHandler, ExternalTaskResult, HandlerRegistry, Variable, Worker,
    WorkerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct PingHandler;

#[async_trait]
impl ExternalTaskHandler for PingHandler {
    fn topic(&self) -> &str {
        "ping"
    }

    fn lock_duration(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn retries(&self) -> Option<i32> {
        Some(3)
    }

    async fn execute(
        &self,
        task: ExternalTask,
        _cancellation: CancellationToken,
    ) -> anyhow::Result<ExternalTaskResult> {
        let who = task
            .variable("who")
            .and_then(|v| v.as_str())
            .unwrap_or("world")
            .to_owned();

        let mut output = HashMap::new();
        output.insert("pong".to_owned(), Variable::from(format!("pong, {who}")));
        Ok(ExternalTaskResult::complete().with_variables(output))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base_url = std::env::var("ENGINE_URL")
        .unwrap_or_else(|_| "http://localhost:8080/engine-rest/".to_owned());

    let config = WorkerConfig::new("ping-worker", base_url).with_maximum_tasks(5);
    let registry = HandlerRegistry::new().register(PingHandler);
    let worker = Arc::new(Worker::new(config, registry)?);

    let running = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };

    tokio::signal::ctrl_c().await?;
    worker.shutdown();
    running.await?;

    Ok(())
}
