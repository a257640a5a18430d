//! Background availability prober for the host scheduler and the
//! generation backend.
//!
//! One loop refreshes a process-wide [`HealthState`] so the `/health`
//! endpoint and the execution-strategy decision read cached booleans
//! instead of probing inline. Probe failures are swallowed into
//! `false`; the loop itself never exits on error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vidforge_host::HostClient;

/// Timeout for the backend availability probe.
const BACKEND_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cached availability of the two external dependencies.
///
/// Both flags start `false`; nothing is assumed reachable until a probe
/// says so.
#[derive(Debug, Default)]
pub struct HealthState {
    host_available: AtomicBool,
    backend_available: AtomicBool,
}

impl HealthState {
    pub fn host_available(&self) -> bool {
        self.host_available.load(Ordering::Relaxed)
    }

    pub fn backend_available(&self) -> bool {
        self.backend_available.load(Ordering::Relaxed)
    }

    pub fn set_host_available(&self, available: bool) {
        self.host_available.store(available, Ordering::Relaxed);
    }

    pub fn set_backend_available(&self, available: bool) {
        self.backend_available.store(available, Ordering::Relaxed);
    }
}

/// Periodic health prober. Runs until the cancellation token fires.
pub struct HealthMonitor {
    host: Arc<HostClient>,
    backend_base_url: String,
    interval: Duration,
    state: Arc<HealthState>,
    client: reqwest::Client,
}

impl HealthMonitor {
    pub fn new(
        host: Arc<HostClient>,
        backend_base_url: String,
        interval_secs: u64,
        state: Arc<HealthState>,
    ) -> Self {
        Self {
            host,
            backend_base_url,
            interval: Duration::from_secs(interval_secs),
            state,
            client: reqwest::Client::new(),
        }
    }

    /// Probe loop. The first probe runs immediately so the state is
    /// populated before the first scheduling decision.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Health monitor started");
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Health monitor stopping");
                    return;
                }
            }
        }
    }

    async fn probe_once(&self) {
        let host_up = self.host.is_available().await;
        let backend_up = self.probe_backend().await;

        if host_up != self.state.host_available() {
            tracing::info!(available = host_up, "Host scheduler availability changed");
        }
        if backend_up != self.state.backend_available() {
            tracing::info!(available = backend_up, "Generation backend availability changed");
        }

        self.state.set_host_available(host_up);
        self.state.set_backend_available(backend_up);
    }

    async fn probe_backend(&self) -> bool {
        match self
            .client
            .get(&self.backend_base_url)
            .timeout(BACKEND_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_unavailable() {
        let state = HealthState::default();
        assert!(!state.host_available());
        assert!(!state.backend_available());
    }

    #[test]
    fn flags_are_independent() {
        let state = HealthState::default();
        state.set_host_available(true);
        assert!(state.host_available());
        assert!(!state.backend_available());

        state.set_backend_available(true);
        state.set_host_available(false);
        assert!(!state.host_available());
        assert!(state.backend_available());
    }
}
