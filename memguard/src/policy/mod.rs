//! Worker killing policies
//!
//! A policy picks at most one worker to terminate out of the live workers
//! presented by the driver. Policies are pure: no I/O, no state carried between
//! calls, input never mutated. Calling one repeatedly while removing each victim
//! yields the full kill order it implies (see [`kill_order`]).
//!
//! Two strategies exist:
//!
//! - [`RetriableLifoPolicy`]: retriable workers first, newest first within each class.
//! - [`GroupByDepthPolicy`]: most populous depth tier (deepest on ties), newest first.

mod group_by_depth;
mod report;
mod retriable_lifo;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::{error, info};

use crate::memory::MemoryMonitor;
use crate::worker::{distinct_workers, WorkerSnapshot};

pub use group_by_depth::GroupByDepthPolicy;
pub use report::kill_order_report;
pub use retriable_lifo::RetriableLifoPolicy;

/// Chooses the worker to terminate under memory pressure.
///
/// The monitor is passed so a policy could read current memory figures; the
/// provided policies decide from the worker list alone.
pub trait WorkerKillingPolicy: Send + Sync {
    /// Short policy name, as used in configuration
    fn name(&self) -> &'static str;

    /// Returns the victim, or `None` when `workers` is empty.
    fn select_worker_to_kill<'a>(
        &self,
        workers: &'a [WorkerSnapshot],
        monitor: &MemoryMonitor,
    ) -> Option<&'a WorkerSnapshot>;
}

/// The closed set of available policies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillingPolicyKind {
    #[default]
    RetriableLifo,
    GroupByDepth,
}

impl KillingPolicyKind {
    /// Resolve a configured policy name. Unknown names fall back to retriable LIFO.
    pub fn from_name(name: &str) -> Self {
        match name {
            "retriable_lifo" => Self::RetriableLifo,
            "group_by_depth" => Self::GroupByDepth,
            other => {
                error!(
                    "{} is an invalid killing policy. Defaulting to retriable_lifo policy.",
                    other
                );
                Self::RetriableLifo
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetriableLifo => "retriable_lifo",
            Self::GroupByDepth => "group_by_depth",
        }
    }

    pub fn build(&self) -> Box<dyn WorkerKillingPolicy> {
        info!("Running {} worker killing policy", self.as_str());
        match self {
            Self::RetriableLifo => Box::new(RetriableLifoPolicy::new()),
            Self::GroupByDepth => Box::new(GroupByDepthPolicy::new()),
        }
    }
}

impl fmt::Display for KillingPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recency order with a deterministic tie-break on worker id.
///
/// `Greater` means `left` should be killed before `right`.
pub(crate) fn recency_order(left: &WorkerSnapshot, right: &WorkerSnapshot) -> Ordering {
    left.submitted_at
        .cmp(&right.submitted_at)
        .then_with(|| left.worker_id.cmp(&right.worker_id))
}

/// Full kill ranking implied by `policy`: select, remove, repeat.
pub fn kill_order(
    policy: &dyn WorkerKillingPolicy,
    workers: &[WorkerSnapshot],
    monitor: &MemoryMonitor,
) -> Vec<WorkerSnapshot> {
    let mut remaining: Vec<WorkerSnapshot> =
        distinct_workers(workers).into_iter().cloned().collect();
    let mut ranked = Vec::with_capacity(remaining.len());

    while let Some(victim) = policy.select_worker_to_kill(&remaining, monitor) {
        let victim_id = victim.worker_id.clone();
        if let Some(index) = remaining.iter().position(|w| w.worker_id == victim_id) {
            ranked.push(remaining.remove(index));
        } else {
            break;
        }
    }
    ranked
}
