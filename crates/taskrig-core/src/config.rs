// Worker configuration
//
// WorkerConfig carries everything the fetcher, the worker pool and the
// protocol client need. Validation happens once, before any loop starts;
// the loops themselves assume a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TaskError};

/// Upper bound the engine accepts for the long-poll timeout (30 minutes).
pub const MAX_RESPONSE_TIMEOUT_SECS: u64 = 1800;

/// Configuration for an external task worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Unique id of this worker. Locked tasks can only be reported with the
    /// same worker id.
    pub worker_id: String,

    /// Base URL of the engine's REST API, e.g. `http://localhost:8080/engine-rest/`.
    /// A missing trailing slash is appended during validation.
    pub base_url: String,

    /// Long-poll timeout for fetch-and-lock, in seconds. The HTTP client
    /// timeout is derived from this (plus one second) so long polls are
    /// never cut short by the transport.
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Maximum number of tasks held by this worker at a time. Also the
    /// number of parallel worker loops.
    #[serde(default = "default_maximum_tasks")]
    pub maximum_tasks: usize,

    /// Whether the engine should hand out tasks by priority.
    #[serde(default = "default_use_priority")]
    pub use_priority: bool,

    /// Pause between fetch iterations.
    #[serde(default = "default_fetch_interval", with = "duration_millis")]
    pub fetch_interval: Duration,

    /// Attempts per HTTP call before the error surfaces to the calling loop.
    #[serde(default = "default_request_attempts")]
    pub request_attempts: u32,

    /// Delay before the first HTTP retry; doubled after every failed attempt.
    #[serde(default = "default_retry_delay", with = "duration_millis")]
    pub retry_delay: Duration,
}

fn default_response_timeout_secs() -> u64 {
    30
}

fn default_maximum_tasks() -> usize {
    100
}

fn default_use_priority() -> bool {
    true
}

fn default_fetch_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_request_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl WorkerConfig {
    /// Create a configuration with the given identity and engine URL,
    /// defaults everywhere else.
    pub fn new(worker_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            base_url: base_url.into(),
            response_timeout_secs: default_response_timeout_secs(),
            maximum_tasks: default_maximum_tasks(),
            use_priority: default_use_priority(),
            fetch_interval: default_fetch_interval(),
            request_attempts: default_request_attempts(),
            retry_delay: default_retry_delay(),
        }
    }

    /// Set the long-poll timeout in seconds
    pub fn with_response_timeout_secs(mut self, secs: u64) -> Self {
        self.response_timeout_secs = secs;
        self
    }

    /// Set the maximum number of concurrently held tasks
    pub fn with_maximum_tasks(mut self, maximum_tasks: usize) -> Self {
        self.maximum_tasks = maximum_tasks;
        self
    }

    /// Set whether the engine should hand out tasks by priority
    pub fn with_use_priority(mut self, use_priority: bool) -> Self {
        self.use_priority = use_priority;
        self
    }

    /// Set the pause between fetch iterations
    pub fn with_fetch_interval(mut self, interval: Duration) -> Self {
        self.fetch_interval = interval;
        self
    }

    /// Set the HTTP retry budget (attempts and initial delay)
    pub fn with_request_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.request_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Validate the configuration and return the normalized engine URL.
    pub fn engine_url(&self) -> Result<Url> {
        if self.worker_id.trim().is_empty() {
            return Err(TaskError::config("'worker_id' must not be empty"));
        }
        if self.maximum_tasks == 0 {
            return Err(TaskError::config("'maximum_tasks' must be greater than zero"));
        }
        if self.response_timeout_secs == 0 || self.response_timeout_secs > MAX_RESPONSE_TIMEOUT_SECS {
            return Err(TaskError::config(format!(
                "'response_timeout_secs' must be between 1 and {MAX_RESPONSE_TIMEOUT_SECS}"
            )));
        }
        if self.request_attempts == 0 {
            return Err(TaskError::config("'request_attempts' must be greater than zero"));
        }

        let mut normalized = self.base_url.clone();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let url = Url::parse(&normalized).map_err(|e| {
            TaskError::config(format!("'base_url' is not an absolute URL: {e}"))
        })?;
        if url.cannot_be_a_base() {
            return Err(TaskError::config("'base_url' is not an absolute URL"));
        }
        Ok(url)
    }

    /// Validate without consuming the normalized URL
    pub fn validate(&self) -> Result<()> {
        self.engine_url().map(|_| ())
    }
}
