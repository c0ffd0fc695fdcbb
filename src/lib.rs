// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod ingest;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::ingest::types::{IdentityKey, Notice, SourceAdapter};
pub use crate::monitor::{CycleOutcome, FirstRunPolicy, NoticeMonitor};
pub use crate::notify::{DeliveryReport, NoticeBatch, Notifier, NotifierMux};
pub use crate::store::ArchiveStore;
