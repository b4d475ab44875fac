#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! In-process engine for `ezworker` (job polling, HTTP execution, result reporting).

/// Public API for the engine crate.
pub mod api;

mod coordinator;
mod engine;
mod executor;
mod limiter;
mod poller;
mod queue;
mod transport;

pub use api::{
    EngineConfig, EngineHandle, EngineState, HttpMethod, Job, JobResult, WorkerIdentity,
    start_engine,
};
