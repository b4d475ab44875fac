#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Environment-derived configuration shared by the `ezworker` binary and engine.

mod identity;

pub use identity::{
    APP_NAME_VAR, COORDINATOR_URL_VAR, DEFAULT_COORDINATOR_URL, DEFAULT_REGION, DEFAULT_WORKER_ID,
    MACHINE_ID_VAR, REGION_VAR, WorkerIdentity, coordinator_url_from_env, is_production,
};
