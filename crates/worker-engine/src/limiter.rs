//! Per-host politeness budget for outbound requests.
//!
//! One mutex over a host-to-last-send map, never held across an await.
//! [`HostRateLimiter::acquire`] computes the next eligible instant
//! analytically and sleeps until exactly then, re-checking on wake; granting
//! a slot claims it, so two executors aimed at the same host cannot race
//! past the gate together. [`HostRateLimiter::record_send`] then advances
//! the clock once the request has completed, so consecutive sends are spaced
//! by request duration plus the minimum interval.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

/// Entries idle longer than this are dropped from the map.
const PRUNE_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between prune sweeps.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) struct HostRateLimiter {
    min_interval: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    last_send: HashMap<String, Instant>,
    last_prune: Instant,
}

impl HostRateLimiter {
    pub(crate) fn new(rate_limit_per_second: f64) -> Self {
        let rate = if rate_limit_per_second.is_finite() && rate_limit_per_second > 0.0 {
            rate_limit_per_second
        } else {
            1.0
        };
        Self {
            min_interval: Duration::from_secs_f64(1.0 / rate),
            state: Mutex::new(LimiterState {
                last_send: HashMap::new(),
                last_prune: Instant::now(),
            }),
        }
    }

    /// Whether a request to `host` may be sent right now. Unseen hosts send
    /// immediately.
    pub(crate) fn can_send(&self, host: &str) -> bool {
        let state = self.state.lock().unwrap();
        match state.last_send.get(host) {
            Some(last) => Instant::now() >= *last + self.min_interval,
            None => true,
        }
    }

    /// Wait until a request to `host` may be sent, then claim the slot.
    pub(crate) async fn acquire(&self, host: &str) {
        loop {
            let deadline = {
                let mut state = self.state.lock().unwrap();
                let now = Instant::now();
                match state.last_send.get(host) {
                    Some(last) if now < *last + self.min_interval => *last + self.min_interval,
                    _ => {
                        state.last_send.insert(host.to_string(), now);
                        return;
                    }
                }
            };
            warn!(
                host,
                wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                "rate limit: waiting for host"
            );
            tokio::time::sleep_until(deadline).await;
        }
    }

    /// Advance the host's clock to the completion time of a request.
    ///
    /// Called after the request finishes, success or failure. Timestamps are
    /// monotonically non-decreasing per host.
    pub(crate) fn record_send(&self, host: &str) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        match state.last_send.get_mut(host) {
            Some(last) => {
                if now > *last {
                    *last = now;
                }
            }
            None => {
                state.last_send.insert(host.to_string(), now);
            }
        }
        if now.saturating_duration_since(state.last_prune) >= PRUNE_INTERVAL {
            state.last_prune = now;
            state
                .last_send
                .retain(|_, last| now.saturating_duration_since(*last) < PRUNE_TTL);
        }
    }

    #[cfg(test)]
    fn tracked_hosts(&self) -> usize {
        self.state.lock().unwrap().last_send.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "t.example";

    #[tokio::test(start_paused = true)]
    async fn unseen_host_sends_immediately() {
        let limiter = HostRateLimiter::new(1.0);
        assert!(limiter.can_send(HOST));

        let started = Instant::now();
        limiter.acquire(HOST).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_claims_the_slot() {
        let limiter = HostRateLimiter::new(1.0);
        limiter.acquire(HOST).await;
        assert!(!limiter.can_send(HOST));
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_min_interval_after_record() {
        let limiter = HostRateLimiter::new(1.0);
        limiter.record_send(HOST);
        assert!(!limiter.can_send(HOST));

        let started = Instant::now();
        limiter.acquire(HOST).await;
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn honors_configured_rate() {
        let limiter = HostRateLimiter::new(4.0);
        limiter.record_send(HOST);

        let started = Instant::now();
        limiter.acquire(HOST).await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(250));
        assert!(waited < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn hosts_are_independent() {
        let limiter = HostRateLimiter::new(1.0);
        limiter.record_send(HOST);
        assert!(limiter.can_send("other.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn later_record_extends_the_window() {
        let limiter = HostRateLimiter::new(1.0);
        limiter.record_send(HOST);
        tokio::time::advance(Duration::from_millis(600)).await;
        limiter.record_send(HOST);
        tokio::time::advance(Duration::from_millis(600)).await;
        // 1.2s after the first send, but only 0.6s after the second.
        assert!(!limiter.can_send(HOST));
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(limiter.can_send(HOST));
    }

    #[tokio::test(start_paused = true)]
    async fn prunes_idle_hosts() {
        let limiter = HostRateLimiter::new(1.0);
        limiter.record_send("stale.example");
        tokio::time::advance(PRUNE_TTL + Duration::from_secs(1)).await;
        limiter.record_send(HOST);
        assert_eq!(limiter.tracked_hosts(), 1);
        assert!(limiter.can_send("stale.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_falls_back_to_one_per_second() {
        let limiter = HostRateLimiter::new(0.0);
        limiter.record_send(HOST);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!limiter.can_send(HOST));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.can_send(HOST));
    }
}
