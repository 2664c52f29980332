//! memguard - memory-pressure defense for a task-execution node agent
//!
//! The crate has two halves:
//!
//! - [`memory`]: a periodic [`memory::MemoryMonitor`] that samples node memory
//!   and reports a pressure verdict to a synchronous callback.
//! - [`policy`]: [`policy::WorkerKillingPolicy`] implementations that pick the
//!   single worker to terminate when the node is above its memory threshold.
//!
//! ```text
//! sampler ─► MemoryMonitor ─► callback ─► Driver ─► WorkerKillingPolicy ─► victim
//! ```
//!
//! The driver that gathers live workers and terminates the victim lives outside
//! this crate (see the `memguard-agent` binary for a reporting-only driver).

pub mod config;
pub mod memory;
pub mod policy;
pub mod worker;

pub use config::{load_config, ConfigError, MemoryMonitorConfig};
pub use memory::{
    MemoryMonitor, MemoryPressureCallback, MemorySampler, MemorySnapshot, MemoryThresholds,
    ProcMemorySampler, SamplingError,
};
pub use policy::{
    kill_order, kill_order_report, GroupByDepthPolicy, KillingPolicyKind, RetriableLifoPolicy,
    WorkerKillingPolicy,
};
pub use worker::{TaskKind, TaskSpec, WorkerId, WorkerSnapshot};
