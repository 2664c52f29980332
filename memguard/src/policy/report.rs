//! Operator-facing rendering of a kill order

use std::fmt::Write;
use tracing::debug;

use crate::memory::MemorySnapshot;
use crate::worker::WorkerSnapshot;

/// Renders the first `max_to_print` entries of a ranked worker list, one per line.
///
/// Memory use comes from the snapshot's per-process table; workers whose pid
/// is unknown to it are reported as using zero bytes.
pub fn kill_order_report(
    ranked: &[WorkerSnapshot],
    max_to_print: usize,
    snapshot: &MemorySnapshot,
) -> String {
    let mut out = String::new();
    for (index, worker) in ranked.iter().take(max_to_print).enumerate() {
        let used = match worker.pid.and_then(|pid| snapshot.process_used(pid)) {
            Some(bytes) => bytes,
            None => {
                debug!(
                    "Can't find memory usage for worker {} (pid {:?}), reporting zero",
                    worker.worker_id, worker.pid
                );
                0
            }
        };
        let _ = writeln!(
            out,
            "Worker {}: task assigned time counter {} worker id {} memory used {} task spec {}",
            index + 1,
            worker.submitted_at,
            worker.worker_id,
            used,
            worker.task
        );
    }
    out
}
