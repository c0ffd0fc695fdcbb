//! Notice monitor binary entrypoint.
//! Loads configuration, sets up logging, then runs one sweep or sweeps forever.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use notice_monitor::config::MonitorConfig;
use notice_monitor::ingest::{config as source_config, http_client, providers};
use notice_monitor::scheduler::{self, SweepCfg};
use notice_monitor::{logging, NotifierMux};

#[derive(Debug, Parser)]
#[command(
    name = "notice-monitor",
    version,
    about = "Watch QFNU announcement pages and forward new notices"
)]
struct Cli {
    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Seconds to sleep between sweeps in loop mode
    #[arg(long, env = "MONITOR_INTERVAL_SECS", default_value_t = 1800)]
    interval: u64,

    /// Directory holding the per-source state files
    #[arg(long, env = "MONITOR_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, env = "MONITOR_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Log files older than this are removed at startup
    #[arg(long, default_value_t = 24)]
    log_retention_hours: u64,

    /// Only check these sources (repeatable)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _guard = logging::init_tracing(&cli.log_dir)?;
    let retention = Duration::from_secs(cli.log_retention_hours.saturating_mul(3600));
    match logging::clean_old_logs(&cli.log_dir, retention) {
        Ok(0) => tracing::info!("no stale log files to clean"),
        Ok(n) => tracing::info!(count = n, "removed stale log files"),
        Err(e) => tracing::error!(error = %format!("{e:#}"), "log cleanup failed"),
    }

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing prometheus exporter")?;
        tracing::info!(%addr, "metrics exporter listening");
    }

    for name in &cli.sources {
        if !providers::SOURCE_NAMES.contains(&name.as_str()) {
            anyhow::bail!(
                "unknown source {name:?} (known: {})",
                providers::SOURCE_NAMES.join(", ")
            );
        }
    }

    let cfg = MonitorConfig::from_env().context("invalid notification configuration")?;
    cfg.log_summary();
    let mux = NotifierMux::from_config(&cfg)?;

    let overrides = source_config::load_overrides_default()?;
    let client = http_client()?;
    let specs = source_config::apply_overrides(providers::catalogue(&client), &overrides);
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating data dir {}", cli.data_dir.display()))?;
    let monitors = scheduler::build_monitors(specs, &cli.data_dir, &cli.sources)?;
    tracing::info!(
        sources = monitors.len(),
        data_dir = %cli.data_dir.display(),
        once = cli.once,
        "notice monitor starting"
    );

    if cli.once {
        scheduler::run_sweep(&monitors, &mux).await;
        return Ok(());
    }

    let interval = Duration::from_secs(cli.interval.max(1));
    scheduler::run_forever(&monitors, &mux, SweepCfg { interval }).await;
    Ok(())
}
