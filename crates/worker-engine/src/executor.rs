//! Executor workers: pop a job, gate on the limiter, execute, report.
//!
//! A transport failure is a reportable outcome, never a worker failure;
//! nothing on this path unwinds past the loop. The work item's buffers are
//! dropped only after the report attempt, and always before the next pop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Url;
use tracing::{debug, warn};

use crate::api::JobResult;
use crate::coordinator;
use crate::limiter::HostRateLimiter;
use crate::queue::{JobQueue, WorkItem};
use crate::transport;

pub(crate) struct Executor {
    pub(crate) worker_idx: usize,
    pub(crate) http: reqwest::Client,
    pub(crate) queue: Arc<JobQueue>,
    pub(crate) limiter: Arc<HostRateLimiter>,
    pub(crate) coordinator_url: Url,
}

impl Executor {
    pub(crate) async fn run(self) {
        while let Some(item) = self.queue.pop().await {
            self.process(item).await;
        }
        debug!(worker_idx = self.worker_idx, "executor stopped");
    }

    async fn process(&self, item: WorkItem) {
        let WorkItem { job_id, job } = item;

        // A target that never parses fails the job before the limiter or the
        // network is touched.
        let (url, host) = match transport::prepare(&job.target_url) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(job_id = %job_id, "job target rejected: {err}");
                self.report(&job_id, &JobResult::from_error(err.kind(), 0)).await;
                return;
            }
        };

        self.limiter.acquire(&host).await;

        let started_at = Instant::now();
        let outcome = transport::request(
            &self.http,
            job.method,
            url,
            &job.headers,
            job.body.as_deref(),
            Duration::from_millis(job.timeout_ms),
        )
        .await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(fetched) => JobResult::from_response(fetched.status, fetched.body, elapsed_ms),
            Err(err) => {
                warn!(job_id = %job_id, host = %host, "request failed: {err}");
                JobResult::from_error(err.kind(), elapsed_ms)
            }
        };

        debug!(
            job_id = %job_id,
            success = result.success,
            status = ?result.status_code,
            elapsed_ms,
            "job executed"
        );
        self.report(&job_id, &result).await;
        self.limiter.record_send(&host);
    }

    async fn report(&self, job_id: &str, result: &JobResult) {
        if let Err(err) =
            coordinator::report_result(&self.http, &self.coordinator_url, job_id, result).await
        {
            warn!(job_id = %job_id, "result report failed: {err:#}");
        }
    }
}
