//! monitor.rs: one observation cycle for one source:
//! fetch → extract → diff against the active window → notify → append.

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::Path;
use tracing::Instrument;

use crate::ingest::find_new;
use crate::ingest::providers::SourceSpec;
use crate::ingest::types::SourceAdapter;
use crate::notify::{DeliveryReport, NoticeBatch, NotifierMux};
use crate::store::ArchiveStore;

/// What to do when a source has never been observed before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirstRunPolicy {
    /// Every notice on the first listing is published.
    Notify,
    /// The first listing is stored silently as the baseline.
    Baseline,
}

/// Result of one `monitor()` call, mostly for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Extraction produced nothing; treated as a transient scrape failure.
    Empty,
    NoChange,
    /// First observation stored without notifying.
    Baseline { stored: usize },
    Published {
        new: usize,
        archived: usize,
        reports: Vec<DeliveryReport>,
    },
    Failed(String),
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Monitor cycles started, per source.");
        describe_counter!("monitor_new_notices_total", "Newly discovered notices.");
        describe_counter!(
            "monitor_cycle_errors_total",
            "Cycles aborted by fetch, parse or write errors."
        );
        describe_counter!(
            "monitor_empty_extractions_total",
            "Cycles whose extraction returned no notices."
        );
        describe_counter!("notify_deliveries_total", "Successful channel publishes.");
        describe_counter!("notify_failures_total", "Failed channel publishes.");
        describe_histogram!("monitor_fetch_ms", "Source fetch time in milliseconds.");
    });
}

pub struct NoticeMonitor {
    adapter: Box<dyn SourceAdapter>,
    store: ArchiveStore,
    first_run: FirstRunPolicy,
}

impl NoticeMonitor {
    pub fn new(
        adapter: Box<dyn SourceAdapter>,
        store: ArchiveStore,
        first_run: FirstRunPolicy,
    ) -> Self {
        Self {
            adapter,
            store,
            first_run,
        }
    }

    pub fn from_spec(spec: SourceSpec, data_dir: &Path) -> Result<Self> {
        let store = ArchiveStore::new(data_dir, spec.adapter.name(), spec.max_notices)?;
        Ok(Self::new(spec.adapter, store, spec.first_run))
    }

    pub fn name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn first_run(&self) -> FirstRunPolicy {
        self.first_run
    }

    /// Run one cycle. Errors are logged with source context and folded into
    /// `CycleOutcome::Failed`; nothing escapes.
    pub async fn monitor(&self, mux: &NotifierMux) -> CycleOutcome {
        ensure_metrics_described();
        let source = self.adapter.name();
        let span = tracing::info_span!("monitor", source);
        async move {
            counter!("monitor_cycles_total", "source" => source).increment(1);
            match self.run_cycle(mux).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    counter!("monitor_cycle_errors_total", "source" => source).increment(1);
                    tracing::error!(error = %format!("{e:#}"), "monitor cycle failed");
                    CycleOutcome::Failed(format!("{e:#}"))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_cycle(&self, mux: &NotifierMux) -> Result<CycleOutcome> {
        let source = self.adapter.name();

        let t0 = std::time::Instant::now();
        let raw = self.adapter.fetch().await.context("fetching source")?;
        histogram!("monitor_fetch_ms", "source" => source)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        let current = self.adapter.extract(&raw).context("extracting notices")?;
        if current.is_empty() {
            counter!("monitor_empty_extractions_total", "source" => source).increment(1);
            tracing::warn!("no notices extracted, skipping this cycle");
            return Ok(CycleOutcome::Empty);
        }
        tracing::debug!(count = current.len(), "notices extracted");

        let saved = self.store.load_active();
        let is_first_run = saved.is_empty();
        let new = find_new(&current, &saved, self.adapter.identity_key());
        if new.is_empty() {
            tracing::info!("no new notices");
            return Ok(CycleOutcome::NoChange);
        }

        if is_first_run && self.first_run == FirstRunPolicy::Baseline {
            self.store.append(&new).context("storing baseline")?;
            tracing::info!(count = new.len(), "first run, baseline stored without notifying");
            return Ok(CycleOutcome::Baseline { stored: new.len() });
        }

        counter!("monitor_new_notices_total", "source" => source).increment(new.len() as u64);
        tracing::info!(count = new.len(), "new notices found");

        let batch = NoticeBatch {
            source: self.adapter.display_name(),
            notices: &new,
        };
        let reports = mux.publish(&batch).await;

        let archived = self.store.append(&new).context("appending new notices")?;
        Ok(CycleOutcome::Published {
            new: new.len(),
            archived,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{IdentityKey, Notice};
    use crate::notify::Notifier;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeAdapter {
        listing: Mutex<Result<Vec<Notice>, String>>,
    }

    impl FakeAdapter {
        fn new(v: Vec<Notice>) -> Self {
            Self {
                listing: Mutex::new(Ok(v)),
            }
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn display_name(&self) -> &'static str {
            "测试来源"
        }
        fn identity_key(&self) -> IdentityKey {
            IdentityKey::Title
        }
        async fn fetch(&self) -> Result<String> {
            match &*self.listing.lock().unwrap() {
                Ok(v) => Ok(serde_json::to_string(v)?),
                Err(e) => Err(anyhow!(e.clone())),
            }
        }
        fn extract(&self, raw: &str) -> Result<Vec<Notice>> {
            Ok(serde_json::from_str(raw)?)
        }
    }

    struct Recorder(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }
        async fn publish(&self, batch: &NoticeBatch<'_>) -> DeliveryReport {
            self.0.fetch_add(batch.notices.len(), Ordering::SeqCst);
            DeliveryReport::ok("recorder", 1, None)
        }
    }

    fn n(t: &str) -> Notice {
        Notice::new(t, format!("https://x.test/{t}"), "2025-01-01")
    }

    fn setup(
        dir: &Path,
        listing: Vec<Notice>,
        policy: FirstRunPolicy,
    ) -> (NoticeMonitor, NotifierMux, Arc<AtomicUsize>) {
        let store = ArchiveStore::new(dir, "fake", 3).unwrap();
        let mon = NoticeMonitor::new(Box::new(FakeAdapter::new(listing)), store, policy);
        let sent = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(vec![Box::new(Recorder(sent.clone()))]);
        (mon, mux, sent)
    }

    #[tokio::test]
    async fn first_run_notify_publishes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (mon, mux, sent) = setup(dir.path(), vec![n("A"), n("B")], FirstRunPolicy::Notify);
        let out = mon.monitor(&mux).await;
        assert!(matches!(out, CycleOutcome::Published { new: 2, archived: 0, .. }));
        assert_eq!(sent.load(Ordering::SeqCst), 2);
        assert_eq!(mon.store().load_active().len(), 2);
    }

    #[tokio::test]
    async fn first_run_baseline_stores_silently_then_notifies_later() {
        let dir = tempfile::tempdir().unwrap();
        let (mon, mux, sent) = setup(dir.path(), vec![n("A"), n("B")], FirstRunPolicy::Baseline);
        assert_eq!(mon.monitor(&mux).await, CycleOutcome::Baseline { stored: 2 });
        assert_eq!(sent.load(Ordering::SeqCst), 0);

        let adapter = FakeAdapter::new(vec![n("C"), n("A"), n("B")]);
        let mon = NoticeMonitor::new(
            Box::new(adapter),
            ArchiveStore::new(dir.path(), "fake", 3).unwrap(),
            FirstRunPolicy::Baseline,
        );
        let out = mon.monitor(&mux).await;
        assert!(matches!(out, CycleOutcome::Published { new: 1, .. }));
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unchanged_listing_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let (mon, mux, sent) = setup(dir.path(), vec![n("A")], FirstRunPolicy::Notify);
        mon.monitor(&mux).await;
        let before = std::fs::read(mon.store().data_file()).unwrap();
        assert_eq!(mon.monitor(&mux).await, CycleOutcome::NoChange);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(mon.store().data_file()).unwrap(), before);
    }

    #[tokio::test]
    async fn empty_extraction_writes_and_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mon, mux, sent) = setup(dir.path(), vec![], FirstRunPolicy::Notify);
        assert_eq!(mon.monitor(&mux).await, CycleOutcome::Empty);
        assert_eq!(sent.load(Ordering::SeqCst), 0);
        assert!(!mon.store().data_file().exists());
    }

    #[tokio::test]
    async fn fetch_error_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let (mon, mux, sent) = setup(dir.path(), vec![], FirstRunPolicy::Notify);
        let adapter = FakeAdapter {
            listing: Mutex::new(Err("connection timed out".into())),
        };
        let mon =
            NoticeMonitor::new(Box::new(adapter), mon.store().clone(), FirstRunPolicy::Notify);
        match mon.monitor(&mux).await {
            CycleOutcome::Failed(msg) => assert!(msg.contains("connection timed out"), "{msg}"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(sent.load(Ordering::SeqCst), 0);
        assert!(!mon.store().data_file().exists());
    }

    #[tokio::test]
    async fn write_failure_after_publish_fails_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the data directory should be
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "x").unwrap();
        let (mon, mux, sent) = setup(&blocker, vec![n("A"), n("B")], FirstRunPolicy::Notify);

        match mon.monitor(&mux).await {
            CycleOutcome::Failed(msg) => assert!(msg.contains("appending new notices"), "{msg}"),
            other => panic!("unexpected outcome {other:?}"),
        }
        // publishing happens before the append, so the batch already went out
        assert_eq!(sent.load(Ordering::SeqCst), 2);
        assert!(mon.store().load_active().is_empty());
    }

    #[tokio::test]
    async fn new_notices_are_appended_and_window_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let (mon, mux, _) = setup(dir.path(), vec![n("A"), n("B"), n("C")], FirstRunPolicy::Notify);
        mon.monitor(&mux).await;

        let mon = NoticeMonitor::new(
            Box::new(FakeAdapter::new(vec![n("D"), n("E"), n("C")])),
            mon.store().clone(),
            FirstRunPolicy::Notify,
        );
        let out = mon.monitor(&mux).await;
        assert!(matches!(out, CycleOutcome::Published { new: 2, archived: 2, .. }));
        let titles = |v: Vec<Notice>| v.into_iter().map(|n| n.title).collect::<Vec<_>>();
        let active = titles(mon.store().load_active());
        assert_eq!(active, ["C", "D", "E"]);
        let archive = titles(mon.store().load_archive());
        assert_eq!(archive, ["A", "B"]);
    }
}
