//! Engine lifecycle: wires the poller, queue, limiter and executors, and
//! drives the shutdown sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::api::{EngineConfig, EngineHandle, EngineState};
use crate::executor::Executor;
use crate::limiter::HostRateLimiter;
use crate::poller::Poller;
use crate::queue::JobQueue;

pub(crate) struct EngineInner {
    pub(crate) state_rx: watch::Receiver<EngineState>,
    stop_requested: AtomicBool,
    notify: tokio::sync::Notify,
}

impl EngineInner {
    pub(crate) fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Resolves once a stop has been requested. Registration happens before
    /// the flag check, so a concurrent `request_stop` is never missed.
    pub(crate) async fn stopped(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.should_stop() {
            return;
        }
        notified.await;
    }
}

pub(crate) fn start_engine(cfg: EngineConfig) -> EngineHandle {
    let (state_tx, state_rx) = watch::channel(EngineState::Init);
    let inner = Arc::new(EngineInner {
        state_rx,
        stop_requested: AtomicBool::new(false),
        notify: tokio::sync::Notify::new(),
    });

    let join = tokio::spawn(run_engine(inner.clone(), state_tx, cfg));
    EngineHandle { inner, join }
}

async fn run_engine(
    inner: Arc<EngineInner>,
    state_tx: watch::Sender<EngineState>,
    mut cfg: EngineConfig,
) -> anyhow::Result<()> {
    if cfg.executors == 0 {
        cfg.executors = 1;
    }
    if cfg.poll_interval < Duration::from_secs(1) {
        cfg.poll_interval = Duration::from_secs(1);
    }
    if cfg.jobs_per_pull == 0 {
        cfg.jobs_per_pull = EngineConfig::DEFAULT_JOBS_PER_PULL;
    }
    if cfg.queue_capacity == 0 {
        cfg.queue_capacity = EngineConfig::DEFAULT_QUEUE_CAPACITY;
    }

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|err| anyhow::anyhow!("build http client: {err:#}"))?;

    let queue = Arc::new(JobQueue::new(cfg.queue_capacity));
    let limiter = Arc::new(HostRateLimiter::new(cfg.rate_limit_per_second));

    let mut executor_join = JoinSet::new();
    for worker_idx in 0..cfg.executors {
        let executor = Executor {
            worker_idx,
            http: http.clone(),
            queue: queue.clone(),
            limiter: limiter.clone(),
            coordinator_url: cfg.coordinator_url.clone(),
        };
        executor_join.spawn(executor.run());
    }

    let poller = Poller {
        http,
        queue: queue.clone(),
        inner: inner.clone(),
        coordinator_url: cfg.coordinator_url.clone(),
        worker_id: cfg.identity.worker_id.clone(),
        region: cfg.identity.region.clone(),
        jobs_per_pull: cfg.jobs_per_pull,
        poll_interval: cfg.poll_interval,
        max_jitter: cfg.max_jitter,
        downgrade_https: cfg.downgrade_https,
    };
    let poller_join = tokio::spawn(poller.run());

    let _ = state_tx.send(EngineState::Running);
    info!(
        executors = cfg.executors,
        worker_id = %cfg.identity.worker_id,
        region = %cfg.identity.region,
        coordinator = %cfg.coordinator_url,
        "engine running"
    );

    inner.stopped().await;
    let _ = state_tx.send(EngineState::Stopping);
    info!("stop requested; draining");

    // The poller exits its sleep on the stop notify and stops pushing; only
    // then is the queue closed, so executors drain whatever was pulled.
    if let Err(err) = poller_join.await {
        warn!("poller join error: {err:#}");
    }
    queue.close();
    while let Some(res) = executor_join.join_next().await {
        if let Err(err) = res {
            warn!("executor join error: {err:#}");
        }
    }

    let _ = state_tx.send(EngineState::Stopped);
    info!("engine stopped");
    Ok(())
}
