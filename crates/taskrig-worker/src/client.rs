// Protocol client for the engine's external-task REST API
//
// One POST per operation, JSON bodies, camelCase fields. Any non-success
// status becomes TaskError::Transport carrying the path, status code,
// request body and response body. Connectivity failures and 5xx answers are
// retried with exponential backoff before the error surfaces to the
// calling loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use taskrig_core::protocol::{
    BpmnErrorRequest, CompleteRequest, FailRequest, FetchExternalTasks, LockedExternalTask,
};
use taskrig_core::{Result, TaskError, WorkerConfig};
use tracing::warn;
use url::Url;
use uuid::Uuid;

/// The four wire operations, as a seam between the loops and the transport.
/// Implementations must be safe for concurrent use by the fetcher and all
/// worker loops.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Offer unworked tasks and lock them for this worker. An absent or
    /// empty response body yields an empty list, never an error.
    async fn fetch_and_lock(
        &self,
        request: &FetchExternalTasks,
    ) -> Result<Vec<LockedExternalTask>>;

    async fn complete(&self, id: Uuid, request: &CompleteRequest) -> Result<()>;

    async fn fail(&self, id: Uuid, request: &FailRequest) -> Result<()>;

    async fn bpmn_error(&self, id: Uuid, request: &BpmnErrorRequest) -> Result<()>;
}

/// reqwest-backed implementation of [`EngineApi`]
pub struct EngineClient {
    client: reqwest::Client,
    base_url: Url,
    request_attempts: u32,
    retry_delay: Duration,
}

impl EngineClient {
    /// Build a client from a validated configuration. The HTTP timeout is
    /// one second above the long-poll timeout so the engine, not the
    /// transport, ends a quiet poll.
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        let base_url = config.engine_url()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.response_timeout_secs + 1))
            .build()
            .map_err(|e| TaskError::connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            request_attempts: config.request_attempts,
            retry_delay: config.retry_delay,
        })
    }

    async fn post<T: Serialize>(&self, path: &str, request: &T) -> Result<String> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TaskError::config(format!("invalid request path '{path}': {e}")))?;
        let body = serde_json::to_string(request)?;

        let mut delay = self.retry_delay;
        let mut attempt = 1;
        loop {
            match self.send(path, &url, &body).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.request_attempts && err.is_retryable() => {
                    warn!(path, attempt, error = %err, "engine call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(&self, path: &str, url: &Url, body: &str) -> Result<String> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| TaskError::connection(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(TaskError::Transport {
                path: path.to_owned(),
                status: status.as_u16(),
                request: body.to_owned(),
                response: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl EngineApi for EngineClient {
    async fn fetch_and_lock(
        &self,
        request: &FetchExternalTasks,
    ) -> Result<Vec<LockedExternalTask>> {
        let body = self.post("external-task/fetchAndLock", request).await?;
        // some engines answer a quiet poll with no body or a bare null
        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(body)?)
    }

    async fn complete(&self, id: Uuid, request: &CompleteRequest) -> Result<()> {
        self.post(&format!("external-task/{id}/complete"), request)
            .await?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, request: &FailRequest) -> Result<()> {
        self.post(&format!("external-task/{id}/failure"), request)
            .await?;
        Ok(())
    }

    async fn bpmn_error(&self, id: Uuid, request: &BpmnErrorRequest) -> Result<()> {
        self.post(&format!("external-task/{id}/bpmnError"), request)
            .await?;
        Ok(())
    }
}
