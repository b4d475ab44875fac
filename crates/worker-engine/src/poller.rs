//! Pulls pending jobs from the coordinator on a wall-clock-aligned cadence.
//!
//! Every failure on the pull path degrades to an empty batch: the
//! coordinator owns the authoritative queue and re-offers anything this
//! worker fails to pick up, so the loop never retries and never stops on
//! error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng as _;
use reqwest::Url;
use tracing::{debug, warn};

use crate::api::Job;
use crate::coordinator::{self, JobDto};
use crate::engine::EngineInner;
use crate::queue::{JobQueue, PushError, WorkItem};

/// Floor on the inter-poll sleep, keeping a tight grid from spinning.
const MIN_POLL_SLEEP: Duration = Duration::from_millis(100);

pub(crate) struct Poller {
    pub(crate) http: reqwest::Client,
    pub(crate) queue: Arc<JobQueue>,
    pub(crate) inner: Arc<EngineInner>,
    pub(crate) coordinator_url: Url,
    pub(crate) worker_id: String,
    pub(crate) region: String,
    pub(crate) jobs_per_pull: u32,
    pub(crate) poll_interval: Duration,
    pub(crate) max_jitter: Duration,
    pub(crate) downgrade_https: bool,
}

impl Poller {
    pub(crate) async fn run(self) {
        while !self.inner.should_stop() {
            self.poll_once().await;

            let jitter_ms = draw_jitter_ms(self.max_jitter);
            let delay = next_poll_delay(
                Utc::now().timestamp_millis(),
                self.poll_interval,
                jitter_ms,
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.inner.stopped() => {}
            }
        }
        debug!("poller stopped");
    }

    async fn poll_once(&self) {
        let batch = match coordinator::fetch_jobs(
            &self.http,
            &self.coordinator_url,
            &self.worker_id,
            &self.region,
            self.jobs_per_pull,
        )
        .await
        {
            Ok(batch) => batch,
            Err(err) => {
                warn!("job pull failed: {err:#}");
                return;
            }
        };

        if batch.is_empty() {
            debug!("no pending jobs");
            return;
        }

        let mut pushed = 0usize;
        for dto in batch {
            let item = work_item_from_dto(dto, self.downgrade_https);
            match self.queue.push(item) {
                Ok(()) => pushed += 1,
                Err(PushError::Full(item)) => {
                    warn!(
                        job_id = %item.job_id,
                        "job queue full; dropping job for the coordinator to re-offer"
                    );
                }
                Err(PushError::Closed(_)) => return,
            }
        }
        debug!(pushed, depth = self.queue.len(), "jobs queued");
    }
}

/// Build the owned work item a pulled descriptor becomes.
///
/// Outside production, `https://` targets are rewritten to `http://` so jobs
/// can be exercised against local plain-HTTP services.
fn work_item_from_dto(dto: JobDto, downgrade_https: bool) -> WorkItem {
    let mut target_url = dto.target_url;
    if downgrade_https {
        if let Some(rest) = target_url.strip_prefix("https://") {
            warn!(job_id = %dto.id, "rewriting https target to http outside production");
            target_url = format!("http://{rest}");
        }
    }

    WorkItem {
        job_id: dto.id,
        job: Job {
            target_url,
            method: dto.method,
            headers: dto
                .headers
                .map(|headers| headers.into_iter().collect())
                .unwrap_or_default(),
            body: dto.body.map(String::into_bytes),
            timeout_ms: dto.timeout_ms.unwrap_or(coordinator::DEFAULT_TIMEOUT_MS),
        },
    }
}

fn draw_jitter_ms(max_jitter: Duration) -> u64 {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..max_ms)
}

/// Delay until the next poll instant: the wall clock rounded down to whole
/// seconds, plus the poll interval, plus jitter. Alignment keeps the fleet
/// pulling on a common grid; jitter spreads workers within it.
fn next_poll_delay(now_ms: i64, poll_interval: Duration, jitter_ms: u64) -> Duration {
    let interval_s = poll_interval.as_secs().max(1) as i64;
    let next_ms = (now_ms / 1000 + interval_s) * 1000 + jitter_ms as i64;
    let delay_ms = (next_ms - now_ms).max(MIN_POLL_SLEEP.as_millis() as i64);
    Duration::from_millis(delay_ms as u64)
}
