//! Who this worker is and where its coordinator lives.
//!
//! The binary takes no flags; everything here is read from the environment
//! once at startup. Fleet platforms inject the machine id and region; a bare
//! local run falls back to a recognizable development identity.

/// Coordinator ("Clockwork") base URL.
pub const COORDINATOR_URL_VAR: &str = "CLOCKWORK_URL";

/// Machine identifier injected by the fleet platform.
pub const MACHINE_ID_VAR: &str = "FLY_MACHINE_ID";

/// Deployment region injected by the fleet platform.
pub const REGION_VAR: &str = "FLY_REGION";

/// Set on deployed apps. Its absence marks a local/dev environment.
pub const APP_NAME_VAR: &str = "FLY_APP_NAME";

/// Coordinator URL used when [`COORDINATOR_URL_VAR`] is unset.
pub const DEFAULT_COORDINATOR_URL: &str = "http://localhost:4000";

/// Worker id used when [`MACHINE_ID_VAR`] is unset.
pub const DEFAULT_WORKER_ID: &str = "ezworker-local";

/// Region used when [`REGION_VAR`] is unset.
pub const DEFAULT_REGION: &str = "dev";

/// Identity this worker presents to the coordinator on every pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    /// Machine identifier, unique within the fleet.
    pub worker_id: String,
    /// Deployment region.
    pub region: String,
}

impl WorkerIdentity {
    /// Read the identity from the environment, falling back to the local
    /// development defaults.
    pub fn from_env() -> Self {
        Self {
            worker_id: env_or(MACHINE_ID_VAR, DEFAULT_WORKER_ID),
            region: env_or(REGION_VAR, DEFAULT_REGION),
        }
    }
}

/// Coordinator base URL from the environment, unparsed.
pub fn coordinator_url_from_env() -> String {
    env_or(COORDINATOR_URL_VAR, DEFAULT_COORDINATOR_URL)
}

/// Whether this process is running as a deployed app.
///
/// Local runs keep the HTTPS-to-HTTP target downgrade enabled for easier
/// testing against plain-HTTP services; deployed apps never downgrade.
pub fn is_production() -> bool {
    std::env::var_os(APP_NAME_VAR).is_some_and(|v| !v.is_empty())
}

fn env_or(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}
