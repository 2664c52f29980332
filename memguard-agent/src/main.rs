//! memguard agent - runs the memory monitor and reports the worker to kill

mod driver;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use memguard::config::{load_config, MemoryMonitorConfig};
use memguard::memory::{MemoryMonitor, MemorySnapshot, ProcMemorySampler};
use memguard::policy::KillingPolicyKind;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::driver::Driver;

/// Agent CLI arguments
#[derive(Parser, Debug)]
#[command(name = "memguard-agent")]
#[command(about = "Memory-pressure monitor that picks the worker to kill")]
struct Args {
    /// Path to configuration file (TOML, or JSON with a .json extension)
    #[arg(long, env = "MEMGUARD_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// JSON file listing the live workers
    #[arg(long, env = "MEMGUARD_WORKERS_FILE")]
    workers_file: PathBuf,

    /// Killing policy: retriable_lifo or group_by_depth
    #[arg(long, env = "MEMGUARD_KILLING_POLICY")]
    killing_policy: Option<String>,

    /// Usage fraction at which the node is above threshold
    #[arg(long)]
    usage_threshold: Option<f64>,

    /// Free-memory floor in bytes
    #[arg(long)]
    min_free_bytes: Option<u64>,

    /// Sampling period in milliseconds (0 disables periodic sampling)
    #[arg(long)]
    refresh_interval_ms: Option<u64>,

    /// Run a single check and exit
    #[arg(long, default_value = "false")]
    once: bool,
}

impl Args {
    /// CLI > config file > defaults
    fn resolve_config(&self) -> anyhow::Result<MemoryMonitorConfig> {
        let mut config = match &self.config_path {
            Some(path) => {
                let config = load_config(path)
                    .with_context(|| format!("loading config {}", path.display()))?;
                info!("Loaded configuration from: {}", path.display());
                config
            }
            None => MemoryMonitorConfig::default(),
        };

        if let Some(name) = &self.killing_policy {
            config.killing_policy = KillingPolicyKind::from_name(name);
        }
        if let Some(threshold) = self.usage_threshold {
            config.usage_threshold = threshold;
        }
        if let Some(floor) = self.min_free_bytes {
            config.min_free_bytes = Some(floor);
        }
        if let Some(interval) = self.refresh_interval_ms {
            config.refresh_interval_ms = interval;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memguard=info".parse()?)
                .add_directive("memguard_agent=info".parse()?),
        )
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    info!("memguard agent starting...");
    info!("Workers file: {}", args.workers_file.display());
    info!("Killing policy: {}", config.killing_policy);

    let driver = Arc::new(Driver::new(
        config.killing_policy.build(),
        args.workers_file.clone(),
        config.report_top_workers,
    ));
    let sampler = Arc::new(ProcMemorySampler::new().track_processes(config.track_process_memory));

    let callback_driver = driver.clone();
    let monitor = Arc::new(MemoryMonitor::from_config(
        &Handle::current(),
        &config,
        sampler,
        Arc::new(move |above: bool, snapshot: MemorySnapshot, threshold: f64| {
            callback_driver.on_memory_pressure(above, snapshot, threshold)
        }),
    ));
    driver.attach(&monitor);

    if args.once {
        return match monitor.check_once() {
            Some(above) => {
                info!("Single check complete, above threshold: {}", above);
                Ok(())
            }
            None => Err(anyhow::anyhow!("no memory snapshot available")),
        };
    }

    if !monitor.is_running() {
        warn!("Refresh interval is 0, no periodic sampling will happen; use --once for a single check");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down memory monitor");
    monitor.stop();

    Ok(())
}
