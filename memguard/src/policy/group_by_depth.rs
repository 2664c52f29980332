//! Depth-tier selection

use itertools::Itertools;
use tracing::debug;

use crate::memory::MemoryMonitor;
use crate::policy::{recency_order, WorkerKillingPolicy};
use crate::worker::{distinct_workers, WorkerSnapshot};

/// Groups workers by task depth and kills from the most populous tier,
/// preferring the deeper tier on equal size and the newest worker within it.
///
/// The grouping is rebuilt on every call, so removing a victim and calling
/// again always reflects the current tier sizes. With every tier holding one
/// worker this is deepest-first; with a single tier it is plain LIFO.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupByDepthPolicy;

impl GroupByDepthPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl WorkerKillingPolicy for GroupByDepthPolicy {
    fn name(&self) -> &'static str {
        "group_by_depth"
    }

    fn select_worker_to_kill<'a>(
        &self,
        workers: &'a [WorkerSnapshot],
        _monitor: &MemoryMonitor,
    ) -> Option<&'a WorkerSnapshot> {
        let tiers = distinct_workers(workers)
            .into_iter()
            .into_group_map_by(|worker| worker.depth());

        let largest = tiers
            .into_iter()
            .max_by(|(left_depth, left), (right_depth, right)| {
                left.len()
                    .cmp(&right.len())
                    .then_with(|| left_depth.cmp(right_depth))
            });
        let Some((depth, tier)) = largest else {
            debug!("Worker list is empty. Nothing can be killed");
            return None;
        };

        debug!("Selecting from depth {} tier of {} workers", depth, tier.len());
        tier.into_iter().max_by(|left, right| recency_order(left, right))
    }
}
