//! Retriable-first, newest-first selection

use std::cmp::Ordering;
use tracing::debug;

use crate::memory::MemoryMonitor;
use crate::policy::{recency_order, WorkerKillingPolicy};
use crate::worker::{distinct_workers, WorkerSnapshot};

/// Prefers workers whose task will be retried automatically, since their work
/// is not lost for good. Within each class the most recently assigned worker
/// goes first: it has the least sunk progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetriableLifoPolicy;

impl RetriableLifoPolicy {
    pub fn new() -> Self {
        Self
    }
}

/// `Greater` means `left` should be killed before `right`.
fn retriable_lifo_order(left: &WorkerSnapshot, right: &WorkerSnapshot) -> Ordering {
    left.is_retriable()
        .cmp(&right.is_retriable())
        .then_with(|| recency_order(left, right))
}

impl WorkerKillingPolicy for RetriableLifoPolicy {
    fn name(&self) -> &'static str {
        "retriable_lifo"
    }

    fn select_worker_to_kill<'a>(
        &self,
        workers: &'a [WorkerSnapshot],
        _monitor: &MemoryMonitor,
    ) -> Option<&'a WorkerSnapshot> {
        let victim = distinct_workers(workers)
            .into_iter()
            .max_by(|left, right| retriable_lifo_order(left, right));
        if victim.is_none() {
            debug!("Worker list is empty. Nothing can be killed");
        }
        victim
    }
}
