//! Public API types for the in-process `ezworker` engine.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

pub use ezworker_core::WorkerIdentity;

/// Configuration for the in-process engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Coordinator base URL (e.g. `http://localhost:4000`).
    pub coordinator_url: Url,

    /// Identity presented to the coordinator on every pull.
    pub identity: WorkerIdentity,

    /// Number of executor tasks draining the job queue.
    pub executors: usize,

    /// Wall-clock cadence of coordinator polls.
    ///
    /// Polls are aligned to multiples of this interval so a fleet started at
    /// arbitrary times still pulls on a common grid; see `max_jitter`.
    pub poll_interval: Duration,

    /// Upper bound on the random offset added to each aligned poll instant,
    /// desynchronizing workers that share the grid.
    pub max_jitter: Duration,

    /// Number of jobs requested per pull. The coordinator returns at most
    /// one job per response today, so this is advisory.
    pub jobs_per_pull: u32,

    /// Capacity of the in-process job queue. A full queue drops newly pulled
    /// jobs; the coordinator re-offers them.
    pub queue_capacity: usize,

    /// Maximum outbound request rate per target host, in requests/second.
    pub rate_limit_per_second: f64,

    /// Rewrite `https://` targets to `http://` before execution.
    ///
    /// Enabled outside production to ease testing against plain-HTTP
    /// services. Never enable on a deployed worker.
    pub downgrade_https: bool,
}

impl EngineConfig {
    /// Default executor pool size.
    pub const DEFAULT_EXECUTORS: usize = 4;

    /// Default poll cadence.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Default poll jitter bound.
    pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(750);

    /// Default pull batch size.
    pub const DEFAULT_JOBS_PER_PULL: u32 = 5;

    /// Default job queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

    /// Default per-host rate limit (one request per second).
    pub const DEFAULT_RATE_LIMIT_PER_SECOND: f64 = 1.0;
}

/// HTTP method of a job's outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// DELETE request.
    Delete,
    /// PATCH request.
    Patch,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// One outbound HTTP request to perform on behalf of the coordinator.
///
/// Immutable once built; all buffers are owned by the work item carrying it
/// and released by the executor after the result is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Target URL. Expected to be absolute `http`/`https`; a target that is
    /// not is executed as a failed result, not dropped.
    pub target_url: String,
    /// Request method.
    pub method: HttpMethod,
    /// Extra request headers. Empty today; wiring for a future coordinator
    /// headers field.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Outcome of one executed job, as reported to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// True iff the target answered with a 2xx status.
    pub success: bool,
    /// HTTP status of the target's response, when one was received.
    pub status_code: Option<u16>,
    /// Response body (possibly empty).
    pub body: Vec<u8>,
    /// Transport error kind, when the request itself failed. A non-2xx
    /// response is a failure without an error kind.
    pub error_kind: Option<&'static str>,
    /// Time spent in the HTTP call, in milliseconds, measured even on error.
    pub elapsed_ms: u64,
}

impl JobResult {
    pub(crate) fn from_response(status: u16, body: Vec<u8>, elapsed_ms: u64) -> Self {
        Self {
            success: (200..300).contains(&status),
            status_code: Some(status),
            body,
            error_kind: None,
            elapsed_ms,
        }
    }

    pub(crate) fn from_error(kind: &'static str, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            status_code: None,
            body: Vec::new(),
            error_kind: Some(kind),
            elapsed_ms,
        }
    }
}

/// Lifecycle state of a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed but not yet running.
    Init,
    /// Poller and executors are up.
    Running,
    /// Stop requested; draining and joining workers.
    Stopping,
    /// All workers joined. Terminal.
    Stopped,
}

/// Handle to a running in-process engine instance.
pub struct EngineHandle {
    pub(crate) inner: std::sync::Arc<crate::engine::EngineInner>,
    pub(crate) join: tokio::task::JoinHandle<anyhow::Result<()>>,
}

/// Start a new in-process engine instance.
pub fn start_engine(config: EngineConfig) -> EngineHandle {
    crate::engine::start_engine(config)
}

impl EngineHandle {
    /// Request a graceful shutdown (finish in-flight jobs, stop polling).
    pub fn request_stop(&self) {
        self.inner.request_stop();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to lifecycle state transitions.
    pub fn state_changes(&self) -> tokio::sync::watch::Receiver<EngineState> {
        self.inner.state_rx.clone()
    }

    /// Wait for the engine to stop, returning the engine task result.
    pub async fn wait(self) -> anyhow::Result<()> {
        match self.join.await {
            Ok(res) => res,
            Err(err) => Err(anyhow::anyhow!("engine task join error: {err}")),
        }
    }
}
