//! Wire client for the coordinator ("Clockwork"): job pulls and result reports.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::api::{HttpMethod, JobResult};

/// Applied when the coordinator omits a job timeout.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Bounds the coordinator round-trips themselves; target requests carry
/// their own per-job timeout.
const COORDINATOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    job: Option<JobDto>,
}

/// One job descriptor as the coordinator transports it.
#[derive(Debug, Deserialize)]
pub(crate) struct JobDto {
    pub(crate) id: String,
    pub(crate) target_url: String,
    pub(crate) method: HttpMethod,
    #[serde(default)]
    pub(crate) body: Option<String>,
    #[serde(default)]
    pub(crate) headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub(crate) timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultReport {
    success: bool,
    status_code: Option<u16>,
    response_body: String,
    error_kind: Option<&'static str>,
    execution_time_ms: u64,
}

impl From<&JobResult> for ResultReport {
    fn from(result: &JobResult) -> Self {
        Self {
            success: result.success,
            status_code: result.status_code,
            response_body: String::from_utf8_lossy(&result.body).into_owned(),
            error_kind: result.error_kind,
            execution_time_ms: result.elapsed_ms,
        }
    }
}

/// Pull the next batch of pending jobs.
///
/// 204 means an empty batch. 200 carries a single-job envelope; a missing
/// `success` or `job` field also means empty. Any other status is an error
/// for the caller to log; the worker never retries a pull.
pub(crate) async fn fetch_jobs(
    http: &reqwest::Client,
    base: &Url,
    worker_id: &str,
    region: &str,
    limit: u32,
) -> anyhow::Result<Vec<JobDto>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("coordinator url cannot be a base: {base}"))?
        .pop_if_empty()
        .extend(["worker", "jobs"]);
    url.query_pairs_mut()
        .append_pair("worker_id", worker_id)
        .append_pair("region", region)
        .append_pair("limit", &limit.to_string());

    let res = http.get(url).timeout(COORDINATOR_TIMEOUT).send().await?;
    if res.status() == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("http {status}: {body}");
    }

    let envelope: JobEnvelope = res.json().await?;
    if !envelope.success {
        return Ok(Vec::new());
    }
    Ok(envelope.job.into_iter().collect())
}

/// POST a finished job's result envelope back to the coordinator.
///
/// The coordinator is idempotent; a failed report is logged by the caller
/// and never retried.
pub(crate) async fn report_result(
    http: &reqwest::Client,
    base: &Url,
    job_id: &str,
    result: &JobResult,
) -> anyhow::Result<()> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("coordinator url cannot be a base: {base}"))?
        .pop_if_empty()
        .extend(["worker", "jobs", job_id, "result"]);

    let res = http
        .post(url)
        .timeout(COORDINATOR_TIMEOUT)
        .json(&ResultReport::from(result))
        .send()
        .await?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("http {status}: {body}");
    }
    Ok(())
}
