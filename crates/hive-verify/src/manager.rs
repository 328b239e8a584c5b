//! Verifier process lifecycle.
//!
//! [`VerifierProcessManager`] is the single owner of [`VerifierAvailability`].
//! Everything else reads it through an [`AvailabilityHandle`]. The health
//! probe is the source of truth; the start sequence is serialized only to
//! avoid launching the container twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::clock::{Sleeper, TokioSleeper};
use crate::config::VerifierConfig;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use crate::types::VerifierAvailability;

/// Longest the start sequence may spend polling for health.
pub const HEALTH_POLL_CEILING: Duration = Duration::from_secs(60);

/// Health check against the verifier.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

/// What the pipeline needs from the lifecycle manager.
#[async_trait]
pub trait VerifierLifecycle: Send + Sync {
    /// Make the verifier reachable if possible. Idempotent.
    async fn ensure_available(&self) -> VerifierAvailability;

    /// Last known state, without probing.
    fn availability(&self) -> VerifierAvailability;
}

/// Read-only view of the manager's availability state.
#[derive(Debug, Clone)]
pub struct AvailabilityHandle {
    rx: watch::Receiver<VerifierAvailability>,
}

impl AvailabilityHandle {
    /// A handle pinned to one state, for clients used without a manager.
    pub fn fixed(state: VerifierAvailability) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    pub fn current(&self) -> VerifierAvailability {
        *self.rx.borrow()
    }
}

/// Why the start sequence will not be attempted again.
#[derive(Debug)]
enum StartGate {
    Open,
    Closed(String),
}

pub struct VerifierProcessManager {
    spec: ContainerSpec,
    url: String,
    remove_timeout: Duration,
    start_timeout: Duration,
    poll_interval: Duration,
    poll_attempts: u32,
    auto_start: bool,
    probe: Arc<dyn HealthProbe>,
    runtime: Arc<dyn ContainerRuntime>,
    sleeper: Arc<dyn Sleeper>,
    state: watch::Sender<VerifierAvailability>,
    gate: Mutex<StartGate>,
}

impl VerifierProcessManager {
    pub fn new(
        config: &VerifierConfig,
        probe: Arc<dyn HealthProbe>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let (state, _rx) = watch::channel(VerifierAvailability::Unknown);
        let poll_interval = config.poll_interval();
        let poll_attempts = clamp_poll_attempts(poll_interval, config.poll_attempts);
        if poll_attempts < config.poll_attempts {
            warn!(
                requested = config.poll_attempts,
                allowed = poll_attempts,
                interval_ms = config.poll_interval_ms,
                "health poll attempts clamped to the 60s window"
            );
        }
        Self {
            spec: ContainerSpec::from_config(config),
            url: config.base_url().to_string(),
            remove_timeout: config.remove_timeout(),
            start_timeout: config.start_timeout(),
            poll_interval,
            poll_attempts,
            auto_start: config.auto_start,
            probe,
            runtime,
            sleeper: Arc::new(TokioSleeper),
            state,
            gate: Mutex::new(StartGate::Open),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn handle(&self) -> AvailabilityHandle {
        AvailabilityHandle {
            rx: self.state.subscribe(),
        }
    }

    fn set(&self, next: VerifierAvailability) -> VerifierAvailability {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!(from = %prev, to = %next, "verifier availability changed");
        }
        next
    }

    pub async fn ensure_available(&self) -> VerifierAvailability {
        if self.probe.is_healthy().await {
            return self.set(VerifierAvailability::Healthy);
        }
        if !self.auto_start {
            return self.set(VerifierAvailability::Unavailable);
        }

        let mut gate = match self.gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                let gate = self.gate.lock().await;
                // Another caller held the start sequence; it may have succeeded.
                if self.probe.is_healthy().await {
                    return self.set(VerifierAvailability::Healthy);
                }
                gate
            }
        };

        if let StartGate::Closed(reason) = &*gate {
            debug!(reason = %reason, "verifier start already failed in this process");
            return self.set(VerifierAvailability::Unavailable);
        }

        let mut reset = StartingReset {
            state: &self.state,
            armed: true,
        };
        let started = self.start().await;
        reset.armed = false;

        match started {
            Ok(()) => self.set(VerifierAvailability::Healthy),
            Err(reason) => {
                warn!(reason = %reason, "verifier unavailable; papers will be published unverified");
                *gate = StartGate::Closed(reason);
                self.set(VerifierAvailability::Unavailable)
            }
        }
    }

    async fn start(&self) -> Result<(), String> {
        self.set(VerifierAvailability::Starting);

        match self.runtime.version().await {
            Ok(version) => debug!(version = %version, "container runtime present"),
            Err(e) => {
                warn!(
                    error = %e,
                    "no container runtime: install Docker or start the verifier manually at {}",
                    self.url
                );
                return Err(e.to_string());
            }
        }

        if let Err(e) = self
            .runtime
            .remove(&self.spec.name, self.remove_timeout)
            .await
        {
            debug!(error = %e, container = %self.spec.name, "stale container removal failed");
        }

        info!(container = %self.spec.name, image = %self.spec.image, port = self.spec.port, "starting verifier container");
        self.runtime
            .run_detached(&self.spec, self.start_timeout)
            .await
            .map_err(|e| e.to_string())?;

        for attempt in 1..=self.poll_attempts {
            self.sleeper.sleep(self.poll_interval).await;
            if self.probe.is_healthy().await {
                info!(attempt, "verifier healthy");
                return Ok(());
            }
            debug!(attempt, max_attempts = self.poll_attempts, "verifier not healthy yet");
        }

        Err(format!(
            "verifier not healthy after {} probes",
            self.poll_attempts
        ))
    }
}

/// Cap `requested` so that `attempts * interval` stays within
/// [`HEALTH_POLL_CEILING`].
fn clamp_poll_attempts(interval: Duration, requested: u32) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    let allowed = u32::try_from(HEALTH_POLL_CEILING.as_millis() / interval_ms).unwrap_or(u32::MAX);
    requested.min(allowed)
}

/// Puts `Starting` back to `Unknown` when the start sequence is dropped
/// before it settles, e.g. by a cancelled caller.
struct StartingReset<'a> {
    state: &'a watch::Sender<VerifierAvailability>,
    armed: bool,
}

impl Drop for StartingReset<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == VerifierAvailability::Starting {
                *state = VerifierAvailability::Unknown;
                true
            } else {
                false
            }
        });
    }
}

#[async_trait]
impl VerifierLifecycle for VerifierProcessManager {
    async fn ensure_available(&self) -> VerifierAvailability {
        VerifierProcessManager::ensure_available(self).await
    }

    fn availability(&self) -> VerifierAvailability {
        *self.state.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::NullSleeper;
    use crate::error::{HiveError, HiveResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Healthy once the fake runtime has started the container and
    /// `healthy_after` probes have failed since.
    struct ScriptedProbe {
        started: Arc<AtomicBool>,
        always: bool,
        healthy_after: usize,
        calls: AtomicUsize,
        post_start_calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(started: Arc<AtomicBool>, healthy_after: usize) -> Self {
            Self {
                started,
                always: false,
                healthy_after,
                calls: AtomicUsize::new(0),
                post_start_calls: AtomicUsize::new(0),
            }
        }

        fn always_healthy() -> Self {
            Self {
                always: true,
                ..Self::new(Arc::new(AtomicBool::new(false)), 0)
            }
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn is_healthy(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.always {
                return true;
            }
            if !self.started.load(Ordering::SeqCst) {
                return false;
            }
            let n = self.post_start_calls.fetch_add(1, Ordering::SeqCst);
            n >= self.healthy_after
        }
    }

    struct FakeRuntime {
        present: bool,
        run_ok: bool,
        remove_ok: bool,
        hang_on_run: bool,
        started: Arc<AtomicBool>,
        version_calls: AtomicUsize,
        remove_calls: AtomicUsize,
        run_calls: AtomicUsize,
    }

    impl FakeRuntime {
        fn new(present: bool, run_ok: bool, started: Arc<AtomicBool>) -> Self {
            Self {
                present,
                run_ok,
                remove_ok: true,
                hang_on_run: false,
                started,
                version_calls: AtomicUsize::new(0),
                remove_calls: AtomicUsize::new(0),
                run_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn version(&self) -> HiveResult<String> {
            self.version_calls.fetch_add(1, Ordering::SeqCst);
            if self.present {
                Ok("27.0.1".to_string())
            } else {
                Err(HiveError::RuntimeMissing {
                    message: "docker not found".to_string(),
                })
            }
        }

        async fn remove(&self, _name: &str, _timeout: Duration) -> HiveResult<()> {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            if self.remove_ok {
                Ok(())
            } else {
                Err(HiveError::Runtime {
                    command: "docker rm -f hive-verifier".to_string(),
                    message: "daemon busy".to_string(),
                })
            }
        }

        async fn run_detached(&self, _spec: &ContainerSpec, _timeout: Duration) -> HiveResult<()> {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_on_run {
                std::future::pending::<()>().await;
            }
            tokio::task::yield_now().await;
            if self.run_ok {
                self.started.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                Err(HiveError::Runtime {
                    command: "docker run".to_string(),
                    message: "exit status 125".to_string(),
                })
            }
        }
    }

    fn manager(
        probe: Arc<ScriptedProbe>,
        runtime: Arc<FakeRuntime>,
        sleeper: Arc<NullSleeper>,
    ) -> VerifierProcessManager {
        VerifierProcessManager::new(&VerifierConfig::default(), probe, runtime)
            .with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn healthy_probe_skips_start() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::always_healthy());
        let runtime = Arc::new(FakeRuntime::new(true, true, started));
        let mgr = manager(probe.clone(), runtime.clone(), Arc::new(NullSleeper::new()));

        assert_eq!(mgr.availability(), VerifierAvailability::Unknown);
        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Healthy);
        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Healthy);

        assert_eq!(runtime.version_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.handle().current(), VerifierAvailability::Healthy);
    }

    #[tokio::test]
    async fn missing_runtime_is_terminal() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 0));
        let runtime = Arc::new(FakeRuntime::new(false, true, started));
        let mgr = manager(probe, runtime.clone(), Arc::new(NullSleeper::new()));

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);
        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);

        assert_eq!(runtime.version_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.remove_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_start_is_terminal() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 0));
        let runtime = Arc::new(FakeRuntime::new(true, false, started));
        let sleeper = Arc::new(NullSleeper::new());
        let mgr = manager(probe, runtime.clone(), sleeper.clone());

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);
        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);

        assert_eq!(runtime.remove_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.requested().is_empty(), "no polling after a failed start");
    }

    #[tokio::test]
    async fn polls_until_healthy() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 2));
        let runtime = Arc::new(FakeRuntime::new(true, true, started));
        let sleeper = Arc::new(NullSleeper::new());
        let mgr = manager(probe, runtime.clone(), sleeper.clone());

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Healthy);
        assert_eq!(sleeper.requested(), vec![Duration::from_secs(2); 3]);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_ceiling_is_thirty_probes() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), usize::MAX));
        let runtime = Arc::new(FakeRuntime::new(true, true, started));
        let sleeper = Arc::new(NullSleeper::new());
        let mgr = manager(probe.clone(), runtime, sleeper.clone());

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);
        assert_eq!(sleeper.requested().len(), 30);
        assert_eq!(sleeper.elapsed(), Duration::from_secs(60));
        // initial probe + 30 polls
        assert_eq!(probe.calls.load(Ordering::SeqCst), 31);
    }

    #[tokio::test]
    async fn concurrent_callers_start_once() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 0));
        let runtime = Arc::new(FakeRuntime::new(true, true, started));
        let mgr = manager(probe, runtime.clone(), Arc::new(NullSleeper::new()));

        let (a, b) = tokio::join!(mgr.ensure_available(), mgr.ensure_available());

        assert_eq!(a, VerifierAvailability::Healthy);
        assert_eq!(b, VerifierAvailability::Healthy);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_stale_removal_still_runs() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 0));
        let runtime = Arc::new(FakeRuntime {
            remove_ok: false,
            ..FakeRuntime::new(true, true, started)
        });
        let mgr = manager(probe, runtime.clone(), Arc::new(NullSleeper::new()));

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Healthy);
        assert_eq!(runtime.remove_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oversized_poll_budget_is_clamped_to_sixty_seconds() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), usize::MAX));
        let runtime = Arc::new(FakeRuntime::new(true, true, started));
        let sleeper = Arc::new(NullSleeper::new());
        let config = VerifierConfig {
            poll_attempts: 100_000,
            ..VerifierConfig::default()
        };
        let mgr = VerifierProcessManager::new(&config, probe, runtime)
            .with_sleeper(sleeper.clone());

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);
        assert_eq!(sleeper.requested().len(), 30);
        assert_eq!(sleeper.elapsed(), HEALTH_POLL_CEILING);
    }

    #[test]
    fn poll_clamp_keeps_window() {
        assert_eq!(clamp_poll_attempts(Duration::from_secs(2), 30), 30);
        assert_eq!(clamp_poll_attempts(Duration::from_secs(2), 31), 30);
        assert_eq!(clamp_poll_attempts(Duration::from_millis(500), 1_000), 120);
        assert_eq!(clamp_poll_attempts(Duration::from_secs(120), 5), 0);
    }

    #[tokio::test]
    async fn dropped_start_does_not_leave_starting() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 0));
        let runtime = Arc::new(FakeRuntime {
            hang_on_run: true,
            ..FakeRuntime::new(true, true, started)
        });
        let mgr = manager(probe, runtime.clone(), Arc::new(NullSleeper::new()));
        let handle = mgr.handle();

        let attempt =
            tokio::time::timeout(Duration::from_millis(50), mgr.ensure_available()).await;
        assert!(attempt.is_err(), "start should still be pending");
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.current(), VerifierAvailability::Unknown);
        assert_eq!(mgr.availability(), VerifierAvailability::Unknown);
    }

    #[tokio::test]
    async fn auto_start_off_never_touches_runtime() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = Arc::new(ScriptedProbe::new(started.clone(), 0));
        let runtime = Arc::new(FakeRuntime::new(true, true, started));
        let config = VerifierConfig::default().with_auto_start(false);
        let mgr = VerifierProcessManager::new(&config, probe.clone(), runtime.clone());

        assert_eq!(mgr.ensure_available().await, VerifierAvailability::Unavailable);
        assert_eq!(runtime.version_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fixed_handle_reports_its_state() {
        let handle = AvailabilityHandle::fixed(VerifierAvailability::Healthy);
        assert!(handle.current().is_healthy());
    }
}
