// Core types for Taskrig external task workers
//
// This crate holds everything the worker runtime and business handlers share:
// the typed variable codec, the wire DTOs, the handler contract, the result
// sum type and worker configuration. It has no HTTP or runtime dependency.

pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod result;
pub mod task;
pub mod variables;

pub use config::WorkerConfig;
pub use error::{Result, TaskError};
pub use handler::ExternalTaskHandler;
pub use result::ExternalTaskResult;
pub use task::ExternalTask;
pub use variables::{ValueInfo, Variable, VariableValue};
