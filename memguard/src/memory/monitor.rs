//! Memory monitor - periodic pressure evaluation

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MemoryMonitorConfig;
use crate::memory::sampler::MemorySampler;
use crate::memory::types::{is_usage_above_threshold, MemorySnapshot, MemoryThresholds};

/// Pressure callback: `(is_above_threshold, snapshot, usage_fraction_threshold)`.
///
/// Invoked synchronously once per tick; the tick is not done until it returns.
pub type MemoryPressureCallback = Arc<dyn Fn(bool, MemorySnapshot, f64) + Send + Sync>;

/// State shared between the monitor and its ticker task
struct MonitorCore {
    thresholds: MemoryThresholds,
    sampler: Arc<dyn MemorySampler>,
    callback: MemoryPressureCallback,
}

impl MonitorCore {
    fn sample(&self) -> Option<MemorySnapshot> {
        let snapshot = match self.sampler.sample() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Memory sampling failed, skipping tick: {}", e);
                return None;
            }
        };
        if let Err(e) = snapshot.validate() {
            warn!("Discarding memory snapshot: {}", e);
            return None;
        }
        Some(snapshot)
    }

    /// One synchronous pass: sample, evaluate, notify.
    fn tick(&self) -> Option<bool> {
        let snapshot = self.sample()?;
        let above = is_usage_above_threshold(&snapshot, &self.thresholds);
        debug!(
            "Memory usage {}/{} bytes ({} available), above threshold: {}",
            snapshot.used_bytes, snapshot.total_bytes, snapshot.available_bytes, above
        );
        (self.callback)(above, snapshot, self.thresholds.usage_fraction);
        Some(above)
    }
}

/// Periodically samples node memory and reports a pressure verdict.
///
/// A refresh interval of zero disables scheduling entirely; the callback then
/// only fires through [`MemoryMonitor::check_once`].
pub struct MemoryMonitor {
    core: Arc<MonitorCore>,
    refresh_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryMonitor {
    /// Create a monitor and, unless `refresh_interval` is zero, start ticking on `handle`.
    pub fn new(
        handle: &Handle,
        thresholds: MemoryThresholds,
        refresh_interval: Duration,
        sampler: Arc<dyn MemorySampler>,
        callback: MemoryPressureCallback,
    ) -> Self {
        let core = Arc::new(MonitorCore {
            thresholds,
            sampler,
            callback,
        });

        let ticker = if refresh_interval.is_zero() {
            info!("MemoryMonitor disabled: refresh interval is zero");
            None
        } else {
            info!(
                "MemoryMonitor started: usage threshold {}, min free bytes {:?}, refresh every {:?}",
                thresholds.usage_fraction, thresholds.min_free_bytes, refresh_interval
            );
            Some(handle.spawn(run_ticker(core.clone(), refresh_interval)))
        };

        Self {
            core,
            refresh_interval,
            ticker: Mutex::new(ticker),
        }
    }

    /// Create a monitor from a loaded configuration
    pub fn from_config(
        handle: &Handle,
        config: &MemoryMonitorConfig,
        sampler: Arc<dyn MemorySampler>,
        callback: MemoryPressureCallback,
    ) -> Self {
        Self::new(
            handle,
            config.thresholds(),
            config.refresh_interval(),
            sampler,
            callback,
        )
    }

    pub fn thresholds(&self) -> &MemoryThresholds {
        &self.core.thresholds
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Run a single tick now, invoking the callback synchronously.
    ///
    /// Returns the verdict, or `None` when no snapshot was available.
    pub fn check_once(&self) -> Option<bool> {
        self.core.tick()
    }

    /// Take a fresh snapshot without going through the callback path.
    pub fn current_snapshot(&self) -> Option<MemorySnapshot> {
        self.core.sample()
    }

    /// Whether periodic ticks are still scheduled
    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop scheduling further ticks. A tick already in progress completes.
    pub fn stop(&self) {
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("MemoryMonitor stopped");
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("thresholds", &self.core.thresholds)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

async fn run_ticker(core: Arc<MonitorCore>, refresh_interval: Duration) {
    let mut ticker = interval(refresh_interval);
    // Never burst to catch up: each tick finishes before the next is due.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // No await point inside a tick, so abort can only land between ticks.
        core.tick();
    }
}
