use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::memory::sampler::SamplingError;

/// Point-in-time memory reading for the node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Bytes in use
    pub used_bytes: u64,
    /// Total bytes available to the node (or its cgroup)
    pub total_bytes: u64,
    /// Bytes that can still be allocated without reclaim
    pub available_bytes: u64,
    /// Resident bytes per process id, when the sampler tracks processes
    #[serde(default)]
    pub process_used_bytes: HashMap<u32, u64>,
}

impl MemorySnapshot {
    pub fn new(used_bytes: u64, total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            available_bytes,
            process_used_bytes: HashMap::new(),
        }
    }

    pub fn with_process_usage(mut self, process_used_bytes: HashMap<u32, u64>) -> Self {
        self.process_used_bytes = process_used_bytes;
        self
    }

    /// Fraction of total memory in use. `None` when the total is zero.
    pub fn usage_fraction(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some(self.used_bytes as f64 / self.total_bytes as f64)
    }

    /// Memory used by a process, if the snapshot recorded it
    pub fn process_used(&self, pid: u32) -> Option<u64> {
        self.process_used_bytes.get(&pid).copied()
    }

    /// Rejects readings that cannot be evaluated against a threshold.
    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.total_bytes == 0 {
            return Err(SamplingError::InvalidSnapshot(
                "total_bytes is zero".to_string(),
            ));
        }
        if self.used_bytes > self.total_bytes {
            return Err(SamplingError::InvalidSnapshot(format!(
                "used_bytes {} exceeds total_bytes {}",
                self.used_bytes, self.total_bytes
            )));
        }
        Ok(())
    }
}

/// Thresholds that classify a snapshot as above or below the danger line
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryThresholds {
    /// Fraction of total memory considered above threshold, in `[0, 1]`
    pub usage_fraction: f64,
    /// Absolute free-memory floor. `None` disables the check.
    pub min_free_bytes: Option<u64>,
}

impl MemoryThresholds {
    pub fn new(usage_fraction: f64, min_free_bytes: Option<u64>) -> Self {
        Self {
            usage_fraction,
            min_free_bytes,
        }
    }
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            usage_fraction: 0.95,
            min_free_bytes: None,
        }
    }
}

/// Pressure verdict for a snapshot.
///
/// Above threshold when the usage fraction reaches the configured fraction, or
/// when the free-memory floor is enabled and available memory is below it.
/// A snapshot with a zero total is never above threshold; callers are expected
/// to [`MemorySnapshot::validate`] first.
pub fn is_usage_above_threshold(snapshot: &MemorySnapshot, thresholds: &MemoryThresholds) -> bool {
    let over_fraction = snapshot
        .usage_fraction()
        .map(|fraction| fraction >= thresholds.usage_fraction)
        .unwrap_or(false);

    let under_floor = thresholds
        .min_free_bytes
        .map(|floor| snapshot.available_bytes < floor)
        .unwrap_or(false);

    over_fraction || under_floor
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_zero_threshold_flags_any_usage() {
        let thresholds = MemoryThresholds::new(0.0, None);
        let snapshot = MemorySnapshot::new(1, 8 * GIB, 8 * GIB - 1);
        assert!(is_usage_above_threshold(&snapshot, &thresholds));
    }

    #[test]
    fn test_fraction_boundary_is_inclusive() {
        let thresholds = MemoryThresholds::new(0.5, None);
        assert!(is_usage_above_threshold(
            &MemorySnapshot::new(4 * GIB, 8 * GIB, 4 * GIB),
            &thresholds
        ));
        assert!(!is_usage_above_threshold(
            &MemorySnapshot::new(4 * GIB - 1, 8 * GIB, 4 * GIB + 1),
            &thresholds
        ));
    }

    #[test]
    fn test_min_free_floor() {
        let snapshot = MemorySnapshot::new(2 * GIB, 8 * GIB, GIB / 2);

        // Fraction alone (0.25) is well under 0.9
        let disabled = MemoryThresholds::new(0.9, None);
        assert!(!is_usage_above_threshold(&snapshot, &disabled));

        let enabled = MemoryThresholds::new(0.9, Some(GIB));
        assert!(is_usage_above_threshold(&snapshot, &enabled));

        let satisfied = MemoryThresholds::new(0.9, Some(GIB / 2));
        assert!(!is_usage_above_threshold(&snapshot, &satisfied));
    }

    #[test]
    fn test_validate_rejects_inconsistent_readings() {
        assert!(MemorySnapshot::new(0, 0, 0).validate().is_err());
        assert!(MemorySnapshot::new(9, 8, 0).validate().is_err());
        assert!(MemorySnapshot::new(8, 8, 0).validate().is_ok());
    }

    #[test]
    fn test_process_usage_lookup() {
        let snapshot = MemorySnapshot::new(1, 2, 1)
            .with_process_usage(HashMap::from([(42, 1024)]));
        assert_eq!(snapshot.process_used(42), Some(1024));
        assert_eq!(snapshot.process_used(7), None);
    }
}
