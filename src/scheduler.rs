// src/scheduler.rs
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

use crate::ingest::providers::SourceSpec;
use crate::monitor::{CycleOutcome, NoticeMonitor};
use crate::notify::NotifierMux;

#[derive(Clone, Copy, Debug)]
pub struct SweepCfg {
    pub interval: Duration,
}

/// Build one monitor per spec, optionally keeping only the named sources.
pub fn build_monitors(
    specs: Vec<SourceSpec>,
    data_dir: &Path,
    only: &[String],
) -> Result<Vec<NoticeMonitor>> {
    specs
        .into_iter()
        .filter(|s| only.is_empty() || only.iter().any(|n| n == s.adapter.name()))
        .map(|s| NoticeMonitor::from_spec(s, data_dir))
        .collect()
}

/// One sweep: every monitor in order, each fully finished before the next.
pub async fn run_sweep(
    monitors: &[NoticeMonitor],
    mux: &NotifierMux,
) -> Vec<(&'static str, CycleOutcome)> {
    let mut out = Vec::with_capacity(monitors.len());
    for m in monitors {
        tracing::info!(source = m.name(), "checking source");
        let outcome = m.monitor(mux).await;
        out.push((m.name(), outcome));
    }
    let failed = out
        .iter()
        .filter(|(_, o)| matches!(o, CycleOutcome::Failed(_)))
        .count();
    tracing::info!(sources = out.len(), failed, "sweep finished");
    out
}

/// Sweep forever with a fixed sleep between sweeps. Runs until the process is killed.
pub async fn run_forever(monitors: &[NoticeMonitor], mux: &NotifierMux, cfg: SweepCfg) {
    loop {
        run_sweep(monitors, mux).await;
        tracing::debug!(secs = cfg.interval.as_secs(), "sleeping until next sweep");
        tokio::time::sleep(cfg.interval).await;
    }
}
