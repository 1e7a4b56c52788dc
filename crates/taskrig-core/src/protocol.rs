// Wire DTOs for the engine's external-task REST API
//
// Field casing follows the engine contract (camelCase, with the two
// historical lowercase exceptions inside valueInfo). Optional fields are
// omitted from the serialized body, not sent as null.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST external-task/fetchAndLock`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchExternalTasks {
    /// Id of the worker on whose behalf tasks are fetched. Returned tasks are
    /// locked for that worker.
    pub worker_id: String,

    /// Maximum number of tasks to return.
    pub max_tasks: usize,

    /// Whether tasks should be fetched based on their priority.
    pub use_priority: bool,

    /// Long-poll timeout in milliseconds.
    pub async_response_timeout: u64,

    /// Topics to fetch tasks for. Returned tasks may be arbitrarily
    /// distributed among these topics.
    pub topics: Vec<TopicRequest>,
}

/// One topic subscription inside a fetch-and-lock request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRequest {
    pub topic_name: String,

    /// Duration to lock fetched tasks for, in milliseconds.
    pub lock_duration: u64,

    /// Variable names to return with each task. Absent means all variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
}

/// One locked task as returned by fetch-and-lock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedExternalTask {
    pub id: Uuid,
    pub topic_name: String,

    /// Id of the worker that holds (or most recently held) the lock.
    pub worker_id: String,

    #[serde(default)]
    pub variables: HashMap<String, VariableDto>,

    /// Remaining retries, when the task has failed before. Absent on the
    /// first attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
}

/// Request body for `POST external-task/{id}/complete`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub worker_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, VariableDto>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_variables: Option<HashMap<String, VariableDto>>,
}

/// Request body for `POST external-task/{id}/failure`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailRequest {
    pub worker_id: String,
    pub error_message: String,
    pub error_details: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, VariableDto>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_variables: Option<HashMap<String, VariableDto>>,

    /// Remaining retries after this failure. Absent leaves the engine's
    /// counter untouched (an incident is raised at zero).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,

    /// Wait before the task becomes fetchable again, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_timeout: Option<u64>,
}

/// Request body for `POST external-task/{id}/bpmnError`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpmnErrorRequest {
    pub worker_id: String,
    pub error_code: String,
    pub error_message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, VariableDto>>,
}

/// A typed variable value as it appears on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_info: Option<ValueInfoDto>,
}

/// Additional, value-type-dependent properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueInfoDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialization_data_format: Option<String>,

    // the engine expects these two all-lowercase
    #[serde(default, rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, rename = "mimetype", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}
