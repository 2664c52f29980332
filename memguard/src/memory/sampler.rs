//! Memory samplers - the source of `MemorySnapshot`s

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::memory::types::MemorySnapshot;

/// Error when a sampler cannot produce a snapshot.
///
/// The monitor recovers from every variant locally by skipping the tick.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Sampler unavailable: {0}")]
    Unavailable(String),
}

/// Source of node memory readings.
///
/// Implementations are called once per monitor tick and must return promptly.
pub trait MemorySampler: Send + Sync {
    fn sample(&self) -> Result<MemorySnapshot, SamplingError>;
}

impl<F> MemorySampler for F
where
    F: Fn() -> Result<MemorySnapshot, SamplingError> + Send + Sync,
{
    fn sample(&self) -> Result<MemorySnapshot, SamplingError> {
        self()
    }
}

/// Linux sampler backed by procfs, preferring the cgroup v2 limit when one is set.
#[derive(Debug, Clone)]
pub struct ProcMemorySampler {
    proc_root: PathBuf,
    cgroup_root: PathBuf,
    track_processes: bool,
}

impl ProcMemorySampler {
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys/fs/cgroup")
    }

    /// Sampler reading from alternate procfs and cgroup mount points
    pub fn with_roots(proc_root: impl Into<PathBuf>, cgroup_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            cgroup_root: cgroup_root.into(),
            track_processes: true,
        }
    }

    pub fn track_processes(mut self, enabled: bool) -> Self {
        self.track_processes = enabled;
        self
    }

    fn sample_cgroup(&self) -> Option<MemorySnapshot> {
        let membership = read_file(&self.proc_root.join("self/cgroup")).ok()?;
        let relative = cgroup_v2_path(&membership)?;
        let dir = self.cgroup_root.join(relative.trim_start_matches('/'));

        let limit = read_file(&dir.join("memory.max"))
            .ok()
            .and_then(|text| parse_cgroup_value(&text))?;
        if limit == 0 {
            return None;
        }
        let current = read_file(&dir.join("memory.current"))
            .ok()
            .and_then(|text| parse_cgroup_value(&text))?;

        let used = current.min(limit);
        debug!("cgroup v2 memory at {}: {}/{}", dir.display(), used, limit);
        Some(MemorySnapshot::new(used, limit, limit - used))
    }

    fn sample_meminfo(&self) -> Result<MemorySnapshot, SamplingError> {
        let text = read_file(&self.proc_root.join("meminfo"))?;
        let (total, available) = parse_meminfo(&text)?;
        let available = available.min(total);
        Ok(MemorySnapshot::new(total - available, total, available))
    }

    fn sample_processes(&self) -> HashMap<u32, u64> {
        let mut usage = HashMap::new();
        let entries = match fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.proc_root.display(), e);
                return usage;
            }
        };

        for entry in entries.flatten() {
            let pid = match entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) {
                Some(pid) => pid,
                None => continue,
            };
            // Processes exit between listing and reading; skip them.
            if let Some(rss) = read_file(&entry.path().join("status"))
                .ok()
                .and_then(|text| parse_vm_rss(&text))
            {
                usage.insert(pid, rss);
            }
        }
        usage
    }
}

impl Default for ProcMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for ProcMemorySampler {
    fn sample(&self) -> Result<MemorySnapshot, SamplingError> {
        let snapshot = match self.sample_cgroup() {
            Some(snapshot) => snapshot,
            None => self.sample_meminfo()?,
        };

        if self.track_processes {
            Ok(snapshot.with_process_usage(self.sample_processes()))
        } else {
            Ok(snapshot)
        }
    }
}

fn read_file(path: &Path) -> Result<String, SamplingError> {
    fs::read_to_string(path).map_err(|source| SamplingError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Extracts the unified hierarchy path from `/proc/self/cgroup`.
fn cgroup_v2_path(membership: &str) -> Option<&str> {
    membership
        .lines()
        .find_map(|line| line.strip_prefix("0::"))
        .map(|path| if path.is_empty() { "/" } else { path })
}

/// `max` (no limit) and unparsable values yield `None`.
fn parse_cgroup_value(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()
}

fn parse_meminfo(text: &str) -> Result<(u64, u64), SamplingError> {
    let mut total = None;
    let mut available = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kb_value(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kb_value(rest);
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }

    Ok((
        total.ok_or(SamplingError::MissingField("MemTotal"))?,
        available.ok_or(SamplingError::MissingField("MemAvailable"))?,
    ))
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(parse_kb_value)
}

/// Parses a `"   1234 kB"` style value into bytes.
fn parse_kb_value(value: &str) -> Option<u64> {
    let kb = value.split_whitespace().next()?.parse::<u64>().ok()?;
    Some(kb.saturating_mul(1024))
}
