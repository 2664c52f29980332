//! Monitor-to-policy wiring
//!
//! On an above-threshold verdict the driver reloads the live worker list,
//! asks the policy for a victim and reports it. Terminating the process is the
//! job of the surrounding node agent; this driver only reports.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use anyhow::Context;
use memguard::memory::{MemoryMonitor, MemorySnapshot};
use memguard::policy::{kill_order, kill_order_report, WorkerKillingPolicy};
use memguard::worker::WorkerSnapshot;
use tracing::{debug, info, warn};

pub struct Driver {
    policy: Box<dyn WorkerKillingPolicy>,
    workers_file: PathBuf,
    report_top_workers: usize,
    monitor: OnceLock<Weak<MemoryMonitor>>,
}

impl Driver {
    pub fn new(
        policy: Box<dyn WorkerKillingPolicy>,
        workers_file: PathBuf,
        report_top_workers: usize,
    ) -> Self {
        Self {
            policy,
            workers_file,
            report_top_workers,
            monitor: OnceLock::new(),
        }
    }

    /// The monitor is created after the driver (its callback owns the driver),
    /// so it is attached afterwards and held weakly.
    pub fn attach(&self, monitor: &Arc<MemoryMonitor>) {
        if self.monitor.set(Arc::downgrade(monitor)).is_err() {
            warn!("Driver already attached to a memory monitor");
        }
    }

    /// Pressure callback body
    pub fn on_memory_pressure(&self, above: bool, snapshot: MemorySnapshot, threshold: f64) {
        if !above {
            return;
        }
        info!(
            "Memory usage {}/{} bytes is above threshold {} ({} bytes available)",
            snapshot.used_bytes, snapshot.total_bytes, threshold, snapshot.available_bytes
        );

        let Some(monitor) = self.monitor.get().and_then(Weak::upgrade) else {
            warn!("No memory monitor attached, skipping worker selection");
            return;
        };

        let workers = match load_workers(&self.workers_file) {
            Ok(workers) => workers,
            Err(e) => {
                warn!("Cannot read live workers, nothing to kill this cycle: {:#}", e);
                return;
            }
        };

        match self.select_victim(&workers, &monitor) {
            Some(victim) => {
                info!(
                    "Selected worker {} (pid {:?}, task {}) to kill with {} policy",
                    victim.worker_id,
                    victim.pid,
                    victim.task,
                    self.policy.name()
                );
                let ranked = kill_order(self.policy.as_ref(), &workers, &monitor);
                info!(
                    "The top {} workers to be killed based on the worker killing policy:\n{}",
                    self.report_top_workers,
                    kill_order_report(&ranked, self.report_top_workers, &snapshot)
                );
            }
            None => debug!("No live workers, nothing to kill this cycle"),
        }
    }

    pub fn select_victim(
        &self,
        workers: &[WorkerSnapshot],
        monitor: &MemoryMonitor,
    ) -> Option<WorkerSnapshot> {
        self.policy.select_worker_to_kill(workers, monitor).cloned()
    }
}

/// Reads the live worker list: a JSON array of worker snapshots.
pub fn load_workers(path: &Path) -> anyhow::Result<Vec<WorkerSnapshot>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading workers file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("parsing workers file {}", path.display()))
}
