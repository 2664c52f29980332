use memguard::config::MemoryMonitorConfig;
use memguard::memory::{
    MemoryMonitor, MemoryPressureCallback, MemorySampler, MemorySnapshot, MemoryThresholds,
    SamplingError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;

const GIB: u64 = 1024 * 1024 * 1024;

fn fixed(snapshot: MemorySnapshot) -> Arc<dyn MemorySampler> {
    Arc::new(move || Ok::<_, SamplingError>(snapshot.clone()))
}

fn recording_callback(verdicts: Arc<Mutex<Vec<bool>>>) -> MemoryPressureCallback {
    Arc::new(move |above: bool, _: MemorySnapshot, _: f64| {
        verdicts.lock().unwrap().push(above);
    })
}

/// Fails the first `failures` samples, then succeeds.
struct FlakySampler {
    calls: AtomicUsize,
    failures: usize,
}

impl MemorySampler for FlakySampler {
    fn sample(&self) -> Result<MemorySnapshot, SamplingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SamplingError::Unavailable(format!("call {}", call)));
        }
        Ok(MemorySnapshot::new(7 * GIB, 8 * GIB, GIB))
    }
}

#[tokio::test]
async fn test_periodic_ticks_invoke_callback() {
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let monitor = MemoryMonitor::new(
        &Handle::current(),
        MemoryThresholds::new(0.5, None),
        Duration::from_millis(10),
        fixed(MemorySnapshot::new(6 * GIB, 8 * GIB, 2 * GIB)),
        recording_callback(verdicts.clone()),
    );
    assert!(monitor.is_running());

    tokio::time::sleep(Duration::from_millis(120)).await;

    let seen = verdicts.lock().unwrap().clone();
    assert!(seen.len() >= 2, "expected several ticks, got {}", seen.len());
    assert!(seen.iter().all(|above| *above));
}

#[tokio::test]
async fn test_zero_interval_never_self_schedules() {
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = fired.clone();
    let monitor = MemoryMonitor::new(
        &Handle::current(),
        MemoryThresholds::new(0.0, None),
        Duration::ZERO,
        fixed(MemorySnapshot::new(GIB, 8 * GIB, 7 * GIB)),
        Arc::new(move |_: bool, _: MemorySnapshot, _: f64| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        }),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(!monitor.is_running());

    // Explicit one-shot trigger is the only way to fire
    assert_eq!(monitor.check_once(), Some(true));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_halts_ticks() {
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let monitor = MemoryMonitor::new(
        &Handle::current(),
        MemoryThresholds::default(),
        Duration::from_millis(10),
        fixed(MemorySnapshot::new(GIB, 8 * GIB, 7 * GIB)),
        recording_callback(verdicts.clone()),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    monitor.stop();
    assert!(!monitor.is_running());
    let after_stop = verdicts.lock().unwrap().len();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(verdicts.lock().unwrap().len(), after_stop);
    assert!(verdicts.lock().unwrap().iter().all(|above| !*above));
}

#[tokio::test]
async fn test_sampling_failures_are_skipped_and_retried() {
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let monitor = MemoryMonitor::new(
        &Handle::current(),
        MemoryThresholds::new(0.8, None),
        Duration::from_millis(10),
        Arc::new(FlakySampler {
            calls: AtomicUsize::new(0),
            failures: 2,
        }),
        recording_callback(verdicts.clone()),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    monitor.stop();

    let seen = verdicts.lock().unwrap().clone();
    assert!(!seen.is_empty(), "monitor should recover after failures");
    // 7/8 usage is above 0.8
    assert!(seen.iter().all(|above| *above));
}

#[tokio::test]
async fn test_min_free_floor_disabled_uses_fraction_only() {
    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let snapshot = MemorySnapshot::new(GIB, 8 * GIB, 1024);

    let fraction_only = MemoryMonitor::new(
        &Handle::current(),
        MemoryThresholds::new(0.9, None),
        Duration::ZERO,
        fixed(snapshot.clone()),
        recording_callback(verdicts.clone()),
    );
    let with_floor = MemoryMonitor::new(
        &Handle::current(),
        MemoryThresholds::new(0.9, Some(GIB)),
        Duration::ZERO,
        fixed(snapshot),
        recording_callback(verdicts.clone()),
    );

    assert_eq!(fraction_only.check_once(), Some(false));
    assert_eq!(with_floor.check_once(), Some(true));
    assert_eq!(*verdicts.lock().unwrap(), vec![false, true]);
}

#[tokio::test]
async fn test_callback_receives_snapshot_and_threshold() {
    let received = Arc::new(Mutex::new(None));
    let received_cb = received.clone();
    let config = MemoryMonitorConfig {
        usage_threshold: 0.25,
        refresh_interval_ms: 0,
        ..Default::default()
    };
    let monitor = MemoryMonitor::from_config(
        &Handle::current(),
        &config,
        fixed(MemorySnapshot::new(GIB, 2 * GIB, GIB)),
        Arc::new(move |above: bool, snapshot: MemorySnapshot, threshold: f64| {
            *received_cb.lock().unwrap() = Some((above, snapshot, threshold));
        }),
    );

    assert_eq!(monitor.refresh_interval(), Duration::ZERO);
    monitor.check_once();

    let (above, snapshot, threshold) = received.lock().unwrap().clone().unwrap();
    assert!(above);
    assert_eq!(snapshot.used_bytes, GIB);
    assert_eq!(threshold, 0.25);
    assert_eq!(monitor.current_snapshot(), Some(snapshot));
}
