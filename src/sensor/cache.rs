//! Background-refreshed cache of the latest sensor reading.
//!
//! One poller task owns the [`SampleSource`] and is the only writer. Readers
//! take a copy of the cached state under a short-lived lock; the lock is never
//! held while the hardware is being polled.

use super::source::{SampleSource, SensorReading};
use crate::config::SensorCacheConfig;
use crate::error::{Result, TelemetryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What the cache publishes after a failed poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep serving the previous reading; staleness keeps growing.
    #[default]
    RetainLastGood,
    /// Publish a zeroed reading as a new refresh.
    ResetToDefault,
}

/// Lifecycle of the background poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    NotStarted,
    Running,
    StopRequested,
    Stopped,
}

/// Immutable copy of the cache taken at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// Last published reading (zeroed before the first refresh)
    pub reading: SensorReading,
    /// Wall-clock time of the last refresh; never moves backwards
    pub captured_at: Option<DateTime<Utc>>,
    /// Number of refreshes published so far
    pub sequence: u64,
    /// Number of polls that failed so far
    pub failed_polls: u64,
    /// Time since the last refresh, `None` if nothing was published yet
    pub staleness: Option<Duration>,
}

impl SensorSnapshot {
    /// Whether the reading is older than `threshold` or was never refreshed.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.staleness.map_or(true, |age| age > threshold)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    reading: SensorReading,
    captured_at: Option<DateTime<Utc>>,
    refreshed_at: Option<Instant>,
    sequence: u64,
    failed_polls: u64,
}

struct Shared {
    state: Mutex<CacheState>,
    stop: AtomicBool,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Publish the outcome of one poll.
    fn apply(&self, outcome: Result<SensorReading>, policy: FailurePolicy) {
        let failed = outcome.is_err();
        let published = match outcome {
            Ok(reading) => Some(reading),
            Err(err) => {
                warn!(error = %err, ?policy, "Sensor poll failed");
                match policy {
                    FailurePolicy::RetainLastGood => None,
                    FailurePolicy::ResetToDefault => Some(SensorReading::default()),
                }
            }
        };

        let mut state = self.lock_state();
        if failed {
            state.failed_polls += 1;
        }
        if let Some(reading) = published {
            let now = Utc::now();
            state.reading = reading;
            state.captured_at = Some(match state.captured_at {
                Some(previous) if previous > now => previous,
                _ => now,
            });
            state.refreshed_at = Some(Instant::now());
            state.sequence += 1;
        }
    }
}

struct Lifecycle {
    status: CacheStatus,
    source: Option<Box<dyn SampleSource>>,
    worker: Option<JoinHandle<()>>,
}

/// Latest-value cache fed by a background poller.
pub struct SensorCache {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    config: SensorCacheConfig,
}

impl SensorCache {
    /// Create a cache around `source`. Nothing is polled until [`start`].
    ///
    /// [`start`]: SensorCache::start
    pub fn new(source: impl SampleSource, config: SensorCacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState::default()),
                stop: AtomicBool::new(false),
            }),
            lifecycle: Mutex::new(Lifecycle {
                status: CacheStatus::NotStarted,
                source: Some(Box::new(source)),
                worker: None,
            }),
            config,
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> CacheStatus {
        self.lock_lifecycle().status
    }

    /// Settings this cache was created with.
    pub fn config(&self) -> &SensorCacheConfig {
        &self.config
    }

    /// Spawn the background poller. Calling it again while running is a
    /// no-op; a stopped cache cannot be restarted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle();
        match lifecycle.status {
            CacheStatus::Running => return Ok(()),
            CacheStatus::StopRequested | CacheStatus::Stopped => {
                return Err(TelemetryError::sensor_error(
                    "sensor cache was stopped and cannot be restarted",
                ));
            }
            CacheStatus::NotStarted => {}
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            TelemetryError::initialization_error(format!("No async runtime for sensor poller: {}", e))
        })?;
        let source = lifecycle
            .source
            .take()
            .ok_or_else(|| TelemetryError::sensor_error("sample source already consumed"))?;

        info!(
            source = source.name(),
            interval_ms = self.config.refresh_interval_ms,
            "Starting background sensor poller"
        );
        let worker = runtime.spawn(run_poller(
            Arc::clone(&self.shared),
            source,
            self.config.clone(),
        ));
        lifecycle.worker = Some(worker);
        lifecycle.status = CacheStatus::Running;
        Ok(())
    }

    /// Copy of the current cache contents. Never waits on a poll.
    pub fn snapshot(&self) -> SensorSnapshot {
        let state = self.shared.lock_state();
        SensorSnapshot {
            reading: state.reading,
            captured_at: state.captured_at,
            sequence: state.sequence,
            failed_polls: state.failed_polls,
            staleness: state.refreshed_at.map(|at| at.elapsed()),
        }
    }

    /// Ask the poller to exit at its next tick and wait up to `timeout`.
    ///
    /// A poll in progress cannot be interrupted; if it outlives the timeout
    /// the task is left to exit on its own and this is only logged. Only the
    /// first call does anything.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        let worker = {
            let mut lifecycle = self.lock_lifecycle();
            match lifecycle.status {
                CacheStatus::NotStarted => {
                    lifecycle.status = CacheStatus::Stopped;
                    return Ok(());
                }
                CacheStatus::StopRequested | CacheStatus::Stopped => return Ok(()),
                CacheStatus::Running => {}
            }
            self.shared.stop.store(true, Ordering::SeqCst);
            lifecycle.status = CacheStatus::StopRequested;
            lifecycle.worker.take()
        };

        let outcome = match worker {
            Some(worker) => tokio::time::timeout(timeout, worker).await,
            None => Ok(Ok(())),
        };
        self.lock_lifecycle().status = CacheStatus::Stopped;

        match outcome {
            Ok(Ok(())) => {
                info!("Background sensor poller stopped");
                Ok(())
            }
            Ok(Err(join_err)) => Err(TelemetryError::shutdown_error(format!(
                "Sensor poller terminated abnormally: {}",
                join_err
            ))),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Sensor poller still busy after stop timeout; leaving it to exit"
                );
                Ok(())
            }
        }
    }
}

impl Drop for SensorCache {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }
}

async fn run_poller(shared: Arc<Shared>, source: Box<dyn SampleSource>, config: SensorCacheConfig) {
    info!("Sensor poll loop started");
    let mut source = source;

    // First read happens immediately so the cache warms up quickly.
    loop {
        if shared.stop_requested() {
            break;
        }
        source = match poll_once(&shared, source, config.failure_policy).await {
            Some(source) => source,
            None => break,
        };
        if !wait_for_next_poll(&shared, config.refresh_interval(), config.tick()).await {
            break;
        }
    }

    info!("Sensor poll loop exited");
}

/// Run one poll on the blocking pool and publish the result.
///
/// Returns the source for the next round, or `None` if the poll panicked.
async fn poll_once(
    shared: &Shared,
    mut source: Box<dyn SampleSource>,
    policy: FailurePolicy,
) -> Option<Box<dyn SampleSource>> {
    let started = Instant::now();
    let joined = tokio::task::spawn_blocking(move || {
        let outcome = source.poll();
        (source, outcome)
    })
    .await;

    let (source, outcome) = match joined {
        Ok(pair) => pair,
        Err(err) => {
            error!(error = %err, "Sensor poll panicked; poller exiting");
            return None;
        }
    };

    shared.apply(outcome, policy);
    debug!(
        sequence = shared.lock_state().sequence,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Sensor cache refreshed"
    );
    Some(source)
}

/// Sleep until the next poll is due, checking for a stop request every tick.
///
/// Returns `false` if a stop was requested.
async fn wait_for_next_poll(shared: &Shared, interval: Duration, tick: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if shared.stop_requested() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(tick.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct Counting(Arc<AtomicU64>);

    impl SampleSource for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn poll(&mut self) -> Result<SensorReading> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            let v = n as f64;
            Ok(SensorReading {
                temperature: v,
                humidity: v,
                pressure: v,
                device_temperature: v,
                dewpoint: v,
                illuminance: v,
            })
        }
    }

    struct Failing;

    impl SampleSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn poll(&mut self) -> Result<SensorReading> {
            Err(TelemetryError::sensor_error("bus error"))
        }
    }

    fn fast_config() -> SensorCacheConfig {
        SensorCacheConfig::default()
            .with_refresh_interval(Duration::from_millis(20))
            .with_tick(Duration::from_millis(5))
    }

    fn shared() -> Shared {
        Shared {
            state: Mutex::new(CacheState::default()),
            stop: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_captured_at_never_moves_backwards() {
        let shared = shared();
        let ahead = Utc::now() + chrono::Duration::hours(1);
        shared.lock_state().captured_at = Some(ahead);

        shared.apply(Ok(SensorReading::default()), FailurePolicy::RetainLastGood);
        let state = shared.lock_state();
        assert_eq!(state.captured_at, Some(ahead));
        assert_eq!(state.sequence, 1);
        assert!(state.refreshed_at.is_some());
    }

    #[test]
    fn test_captured_at_advances_with_clock() {
        let shared = shared();
        let behind = Utc::now() - chrono::Duration::hours(1);
        shared.lock_state().captured_at = Some(behind);

        shared.apply(Ok(SensorReading::default()), FailurePolicy::RetainLastGood);
        assert!(shared.lock_state().captured_at > Some(behind));
    }

    #[test]
    fn test_failed_poll_leaves_timestamp_alone() {
        let shared = shared();
        shared.apply(
            Err(TelemetryError::sensor_error("bus error")),
            FailurePolicy::RetainLastGood,
        );
        let state = shared.lock_state();
        assert_eq!(state.captured_at, None);
        assert_eq!(state.sequence, 0);
        assert_eq!(state.failed_polls, 1);
    }

    #[test]
    fn test_snapshot_before_start() {
        let cache = SensorCache::new(Counting(Arc::new(AtomicU64::new(0))), fast_config());
        let snapshot = cache.snapshot();
        assert_eq!(cache.status(), CacheStatus::NotStarted);
        assert_eq!(snapshot.sequence, 0);
        assert_eq!(snapshot.staleness, None);
        assert!(snapshot.is_stale(Duration::from_secs(3600)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_is_idempotent_and_refreshes() {
        let polls = Arc::new(AtomicU64::new(0));
        let cache = SensorCache::new(Counting(Arc::clone(&polls)), fast_config());
        cache.start().unwrap();
        cache.start().unwrap();
        assert_eq!(cache.status(), CacheStatus::Running);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let snapshot = cache.snapshot();
        assert!(snapshot.sequence >= 2);
        assert_eq!(snapshot.reading.temperature, snapshot.sequence as f64);
        assert!(snapshot.captured_at.is_some());

        cache.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(cache.status(), CacheStatus::Stopped);
        assert!(cache.start().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retain_last_good_keeps_growing_stale() {
        let cache = SensorCache::new(Failing, fast_config());
        cache.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.sequence, 0);
        assert!(snapshot.failed_polls >= 1);
        assert_eq!(snapshot.reading, SensorReading::default());
        assert!(snapshot.staleness.is_none());
        cache.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reset_to_default_publishes_zeroes() {
        let config = fast_config().with_failure_policy(FailurePolicy::ResetToDefault);
        let cache = SensorCache::new(Failing, config);
        cache.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = cache.snapshot();
        assert!(snapshot.sequence >= 1);
        assert!(snapshot.failed_polls >= snapshot.sequence);
        assert!(snapshot.staleness.is_some());
        cache.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let cache = SensorCache::new(Failing, fast_config());
        cache.stop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(cache.status(), CacheStatus::Stopped);
    }
}
