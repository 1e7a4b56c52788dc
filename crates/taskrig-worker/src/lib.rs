// Taskrig worker runtime
//
// The moving parts, leaves first:
// - channel: bounded FIFO of locked tasks, permit-gated (the only
//   cross-loop synchronization primitive)
// - client: the four wire operations against the engine's REST API
// - registry: static topic -> handler mapping, built once at startup
// - fetcher: keeps the channel as full as free permits allow
// - manager: one loop body per capacity slot: read, execute under the
//   lock deadline, report, release
// - worker: assembles the above, spawns the loops and joins them on shutdown

pub mod channel;
pub mod client;
pub mod fetcher;
pub mod manager;
pub mod registry;
pub mod worker;

pub use channel::WorkChannel;
pub use client::{EngineApi, EngineClient};
pub use registry::HandlerRegistry;
pub use worker::Worker;

// Re-export the core types handlers are written against
pub use taskrig_core::{
    ExternalTask, ExternalTaskHandler, ExternalTaskResult, Result, TaskError, ValueInfo, Variable,
    VariableValue, WorkerConfig,
};
