//! Node memory sampling and pressure monitoring
//!
//! This module turns raw memory readings into a pressure verdict on a fixed
//! cadence. It never terminates anything itself: the only externally visible
//! effect of a tick is the callback invocation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     MemoryMonitor                        │
//! │  • MemoryThresholds (usage fraction, min free bytes)     │
//! │  • refresh interval (0 = never recur)                    │
//! │  • ticker handle (the only mutable state)                │
//! └──────────────────────────────────────────────────────────┘
//!        │ tick                                   ▲
//!        ▼                                        │ verdict
//! ┌───────────────┐   MemorySnapshot   ┌──────────────────────┐
//! │ MemorySampler │ ─────────────────► │ pressure callback    │
//! └───────────────┘                    └──────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use memguard::memory::{MemoryMonitor, MemoryThresholds, ProcMemorySampler};
//!
//! let monitor = MemoryMonitor::new(
//!     &tokio::runtime::Handle::current(),
//!     MemoryThresholds::new(0.95, None),
//!     Duration::from_millis(250),
//!     Arc::new(ProcMemorySampler::new()),
//!     Arc::new(|above, snapshot, threshold| {
//!         if above {
//!             tracing::warn!("{} bytes used, threshold {}", snapshot.used_bytes, threshold);
//!         }
//!     }),
//! );
//! ```

mod monitor;
mod sampler;
mod types;

pub use monitor::{MemoryMonitor, MemoryPressureCallback};
pub use sampler::{MemorySampler, ProcMemorySampler, SamplingError};
pub use types::{is_usage_above_threshold, MemorySnapshot, MemoryThresholds};
