//! Read-only worker views consumed by the killing policies
//!
//! The worker-management subsystem owns the live workers; policies only ever
//! see these snapshots, rebuilt fresh for every selection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Opaque, unique worker identity
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of task assigned to a worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Stateless task, retried up to `max_retries`
    Normal,
    /// Task that constructs an actor, restarted up to `max_restarts`
    ActorCreation,
    /// Method call on a live actor
    ActorInvocation,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "NORMAL",
            Self::ActorCreation => "ACTOR_CREATION",
            Self::ActorInvocation => "ACTOR_INVOCATION",
        };
        f.write_str(name)
    }
}

/// The parts of a task specification the policies care about.
///
/// Retry budgets are signed: `-1` conventionally means unlimited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: TaskKind,
    #[serde(default)]
    pub max_retries: i64,
    #[serde(default)]
    pub max_restarts: i64,
    /// Nesting level in the task-spawning graph, as recorded at submission
    #[serde(default)]
    pub depth: u32,
}

impl TaskSpec {
    pub fn normal(max_retries: i64, depth: u32) -> Self {
        Self {
            kind: TaskKind::Normal,
            max_retries,
            max_restarts: 0,
            depth,
        }
    }

    pub fn actor_creation(max_restarts: i64) -> Self {
        Self {
            kind: TaskKind::ActorCreation,
            max_retries: 0,
            max_restarts,
            depth: 0,
        }
    }

    pub fn actor_invocation(max_restarts: i64) -> Self {
        Self {
            kind: TaskKind::ActorInvocation,
            max_retries: 0,
            max_restarts,
            depth: 0,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Whether killing this task's worker loses no work permanently.
    ///
    /// Any non-zero budget counts, including negative "unlimited" sentinels.
    /// Actor invocations are never replayed on their own.
    pub fn is_retriable(&self) -> bool {
        match self.kind {
            TaskKind::Normal => self.max_retries != 0,
            TaskKind::ActorCreation => self.max_restarts != 0,
            TaskKind::ActorInvocation => false,
        }
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TaskKind::Normal => write!(
                f,
                "{} max_retries={} depth={}",
                self.kind, self.max_retries, self.depth
            ),
            _ => write!(
                f,
                "{} max_restarts={} depth={}",
                self.kind, self.max_restarts, self.depth
            ),
        }
    }
}

/// Point-in-time view of a live worker and its assigned task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub worker_id: WorkerId,
    /// Process id, when known; used only for memory reporting
    #[serde(default)]
    pub pid: Option<u32>,
    /// Monotonic ordering key of the task assignment (larger = more recent)
    pub submitted_at: u64,
    pub task: TaskSpec,
}

impl WorkerSnapshot {
    pub fn new(worker_id: impl Into<WorkerId>, submitted_at: u64, task: TaskSpec) -> Self {
        Self {
            worker_id: worker_id.into(),
            pid: None,
            submitted_at,
            task,
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn is_retriable(&self) -> bool {
        self.task.is_retriable()
    }

    pub fn depth(&self) -> u32 {
        self.task.depth
    }
}

/// Drops repeated identities, keeping the first occurrence.
///
/// Duplicate ids are a caller precondition violation; they are tolerated here
/// so selection never fails on them.
pub fn distinct_workers(workers: &[WorkerSnapshot]) -> Vec<&WorkerSnapshot> {
    let mut seen = HashSet::with_capacity(workers.len());
    workers
        .iter()
        .filter(|worker| {
            let first = seen.insert(&worker.worker_id);
            if !first {
                warn!(
                    "Duplicate worker id {} in candidate list, ignoring repeat",
                    worker.worker_id
                );
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(TaskSpec::normal(3, 0).is_retriable());
        assert!(TaskSpec::normal(-1, 0).is_retriable());
        assert!(!TaskSpec::normal(0, 0).is_retriable());

        assert!(TaskSpec::actor_creation(5).is_retriable());
        assert!(TaskSpec::actor_creation(-1).is_retriable());
        assert!(!TaskSpec::actor_creation(0).is_retriable());

        // Restart budget on an invocation is irrelevant
        assert!(!TaskSpec::actor_invocation(7).is_retriable());
        assert!(!TaskSpec::actor_invocation(-1).is_retriable());
        assert!(!TaskSpec::actor_invocation(0).is_retriable());
    }

    #[test]
    fn test_normal_task_ignores_restart_budget() {
        let spec = TaskSpec {
            kind: TaskKind::Normal,
            max_retries: 0,
            max_restarts: 4,
            depth: 1,
        };
        assert!(!spec.is_retriable());
    }

    #[test]
    fn test_distinct_workers_keeps_first() {
        let workers = vec![
            WorkerSnapshot::new("a", 1, TaskSpec::normal(0, 1)),
            WorkerSnapshot::new("b", 2, TaskSpec::normal(0, 1)),
            WorkerSnapshot::new("a", 3, TaskSpec::normal(1, 2)),
        ];
        let distinct = distinct_workers(&workers);
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].submitted_at, 1);
        assert_eq!(distinct[1].worker_id, WorkerId::new("b"));
    }

    #[test]
    fn test_worker_snapshot_json() {
        let json = r#"{
            "worker_id": "w-1",
            "pid": 4242,
            "submitted_at": 17,
            "task": { "kind": "ACTOR_CREATION", "max_restarts": -1 }
        }"#;
        let worker: WorkerSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(worker.worker_id.as_str(), "w-1");
        assert_eq!(worker.pid, Some(4242));
        assert_eq!(worker.depth(), 0);
        assert!(worker.is_retriable());
    }
}
