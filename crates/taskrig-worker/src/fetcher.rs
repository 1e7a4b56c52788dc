// Fetch-and-lock loop
//
// Keeps the channel as full as free permits allow without over-fetching:
// every iteration reads the free-permit count and requests exactly that
// many tasks across all registered topics. Zero free permits means no
// network call at all. Errors are logged and the loop continues; only
// cancellation during shutdown ends it, silently.

use std::sync::Arc;

use taskrig_core::protocol::FetchExternalTasks;
use taskrig_core::{Result, TaskError, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::channel::WorkChannel;
use crate::client::EngineApi;
use crate::registry::HandlerRegistry;

pub struct Fetcher {
    config: Arc<WorkerConfig>,
    client: Arc<dyn EngineApi>,
    channel: Arc<WorkChannel>,
    registry: Arc<HandlerRegistry>,
}

impl Fetcher {
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

    /// Run until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(err) = self.fetch_once(&shutdown).await {
                if err.is_cancelled() || shutdown.is_cancelled() {
                    break;
                }
                error!(
                    worker_id = %self.config.worker_id,
                    error = %err,
                    "unexpected error while fetching external tasks"
                );
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.fetch_interval) => {}
            }
        }

        debug!(worker_id = %self.config.worker_id, "fetcher stopped");
    }

    /// One fetch iteration: request as many tasks as the channel has free
    /// permits and enqueue everything the engine returned. The write may
    /// itself block briefly if capacity was consumed concurrently.
    pub(crate) async fn fetch_once(&self, shutdown: &CancellationToken) -> Result<()> {
        let capacity = self.channel.capacity();
        if capacity == 0 {
            return Ok(());
        }

        let request = FetchExternalTasks {
            worker_id: self.config.worker_id.clone(),
            max_tasks: capacity,
            use_priority: self.config.use_priority,
            async_response_timeout: self.config.response_timeout_secs * 1000,
            topics: self.registry.topic_requests(),
        };

        debug!(
            worker_id = %self.config.worker_id,
            max_tasks = capacity,
            topics = ?self.registry.topics(),
            "fetching external tasks"
        );

        let tasks = tokio::select! {
            _ = shutdown.cancelled() => return Err(TaskError::Cancelled),
            result = self.client.fetch_and_lock(&request) => result?,
        };

        if !tasks.is_empty() {
            info!(
                worker_id = %self.config.worker_id,
                count = tasks.len(),
                "got external tasks to execute"
            );
        }

        for task in tasks {
            self.channel.write(task, shutdown).await?;
        }

        Ok(())
    }
}
