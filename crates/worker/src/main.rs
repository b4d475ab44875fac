mod shutdown;

use anyhow::Context as _;
use reqwest::Url;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ezworker_core::{WorkerIdentity, coordinator_url_from_env, is_production};
use ezworker_engine::{EngineConfig, EngineState, start_engine};

use crate::shutdown::{ShutdownEvent, spawn_ctrl_c_handler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let coordinator_url = coordinator_url_from_env();
    let coordinator_url = Url::parse(&coordinator_url).with_context(|| {
        format!(
            "invalid {}: {coordinator_url:?}",
            ezworker_core::COORDINATOR_URL_VAR
        )
    })?;
    let identity = WorkerIdentity::from_env();
    let production = is_production();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        worker_id = %identity.worker_id,
        region = %identity.region,
        coordinator = %coordinator_url,
        production,
        "ezworker starting"
    );

    let engine = start_engine(EngineConfig {
        coordinator_url,
        identity,
        executors: EngineConfig::DEFAULT_EXECUTORS,
        poll_interval: EngineConfig::DEFAULT_POLL_INTERVAL,
        max_jitter: EngineConfig::DEFAULT_MAX_JITTER,
        jobs_per_pull: EngineConfig::DEFAULT_JOBS_PER_PULL,
        queue_capacity: EngineConfig::DEFAULT_QUEUE_CAPACITY,
        rate_limit_per_second: EngineConfig::DEFAULT_RATE_LIMIT_PER_SECOND,
        downgrade_https: !production,
    });

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_ctrl_c_handler(shutdown_tx);

    let mut states = engine.state_changes();
    loop {
        tokio::select! {
            ev = shutdown_rx.recv() => match ev {
                Some(ShutdownEvent::Graceful) => {
                    info!("stop requested; finishing in-flight jobs (press CTRL+C again to exit immediately)");
                    engine.request_stop();
                }
                Some(ShutdownEvent::Immediate) => {
                    warn!("stop requested again; exiting immediately");
                    std::process::exit(130);
                }
                None => {}
            },
            res = states.changed() => {
                if res.is_err() || *states.borrow() == EngineState::Stopped {
                    break;
                }
            }
        }
    }

    engine.wait().await
}
