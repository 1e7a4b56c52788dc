// Worker assembly
//
// Wires the channel, the protocol client, the fetcher and the worker pool
// together. `run` spawns one fetcher loop and maximum_tasks manager loops
// and joins them; `shutdown` cancels the root token, which stops the
// fetcher, drains the pool and cancels the execution scope of every task
// still in flight.

use std::sync::Arc;

use futures::future::join_all;
use taskrig_core::{Result, TaskError, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::channel::WorkChannel;
use crate::client::{EngineApi, EngineClient};
use crate::fetcher::Fetcher;
use crate::manager::Manager;
use crate::registry::HandlerRegistry;

pub struct Worker {
    config: Arc<WorkerConfig>,
    client: Arc<dyn EngineApi>,
    registry: Arc<HandlerRegistry>,
    shutdown: CancellationToken,
}

impl Worker {
    /// Build a worker against the engine named by the configuration.
    /// Validates the configuration and refuses an empty registry, since a
    /// worker without handlers would poll for tasks it can never execute.
    pub fn new(config: WorkerConfig, registry: HandlerRegistry) -> Result<Self> {
        let client = Arc::new(EngineClient::new(&config)?);
        Self::with_client(config, registry, client)
    }

    /// Build a worker with a caller-supplied protocol client
    pub fn with_client(
        config: WorkerConfig,
        registry: HandlerRegistry,
        client: Arc<dyn EngineApi>,
    ) -> Result<Self> {
        config.validate()?;
        if registry.is_empty() {
            return Err(TaskError::config(
                "at least one external task handler must be registered",
            ));
        }

        Ok(Self {
            config: Arc::new(config),
            client,
            registry: Arc::new(registry),
            shutdown: CancellationToken::new(),
        })
    }

    /// Run the fetcher and the worker pool until `shutdown` is called.
    pub async fn run(&self) {
        let channel = Arc::new(WorkChannel::new(self.config.maximum_tasks));

        info!(
            worker_id = %self.config.worker_id,
            base_url = %self.config.base_url,
            maximum_tasks = self.config.maximum_tasks,
            topics = ?self.registry.topics(),
            "starting external task worker"
        );

        let fetcher = Fetcher::new(
            Arc::clone(&self.config),
            Arc::clone(&self.client),
            Arc::clone(&channel),
            Arc::clone(&self.registry),
        );

        let mut loops = Vec::with_capacity(self.config.maximum_tasks + 1);
        loops.push(tokio::spawn(fetcher.run(self.shutdown.clone())));

        for _ in 0..self.config.maximum_tasks {
            let manager = Manager::new(
                Arc::clone(&self.config),
                Arc::clone(&self.client),
                Arc::clone(&channel),
                Arc::clone(&self.registry),
            );
            loops.push(tokio::spawn(manager.run(self.shutdown.clone())));
        }

        join_all(loops).await;

        info!(worker_id = %self.config.worker_id, "external task worker stopped");
    }

    /// Stop the worker: the fetcher ends, queued tasks are abandoned to
    /// their lock expiry and in-flight executions see their token fire.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use taskrig_core::{ExternalTask, ExternalTaskHandler, ExternalTaskResult};

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
    fn refuses_an_empty_registry() {
        let config = WorkerConfig::new("worker-1", "http://localhost:8080/engine-rest/");
        let result = Worker::new(config, HandlerRegistry::new());
        assert!(matches!(result, Err(TaskError::Config(_))));
    }

    #[test]
    fn refuses_an_invalid_configuration() {
        let config = WorkerConfig::new("", "http://localhost:8080/engine-rest/");
        let registry = HandlerRegistry::new().register(NoopHandler);
        assert!(matches!(
            Worker::new(config, registry),
            Err(TaskError::Config(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_all_loops() {
        struct IdleEngine;

        #[async_trait]
        impl EngineApi for IdleEngine {
            async fn fetch_and_lock(
                &self,
                _: &taskrig_core::protocol::FetchExternalTasks,
            ) -> taskrig_core::Result<Vec<taskrig_core::protocol::LockedExternalTask>> {
                Ok(Vec::new())
            }

            async fn complete(
                &self,
                _: uuid::Uuid,
                _: &taskrig_core::protocol::CompleteRequest,
            ) -> taskrig_core::Result<()> {
                Ok(())
            }

            async fn fail(
                &self,
                _: uuid::Uuid,
                _: &taskrig_core::protocol::FailRequest,
            ) -> taskrig_core::Result<()> {
                Ok(())
            }

            async fn bpmn_error(
                &self,
                _: uuid::Uuid,
                _: &taskrig_core::protocol::BpmnErrorRequest,
            ) -> taskrig_core::Result<()> {
                Ok(())
            }
        }

        let config = WorkerConfig::new("worker-1", "http://localhost:8080/engine-rest/")
            .with_maximum_tasks(2)
            .with_fetch_interval(Duration::from_millis(10));
        let registry = HandlerRegistry::new().register(NoopHandler);
        let worker =
            Arc::new(Worker::with_client(config, registry, Arc::new(IdleEngine)).unwrap());

        let running = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.shutdown();

        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("worker loops did not stop after shutdown")
            .unwrap();
    }
}
