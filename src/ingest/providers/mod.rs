// src/ingest/providers/mod.rs
pub mod jwc;
pub mod library;
pub mod xg;
pub mod zsb;

use scraper::ElementRef;

use crate::ingest::types::{IdentityKey, Notice, SourceAdapter};
use crate::ingest::{dedup_by_identity, normalize_text};
use crate::monitor::FirstRunPolicy;

/// Static per-source settings before any override file is applied.
pub struct SourceSpec {
    pub adapter: Box<dyn SourceAdapter>,
    pub max_notices: usize,
    pub first_run: FirstRunPolicy,
}

pub const SOURCE_NAMES: [&str; 5] = ["jwc_gg", "jwc_tz", "xg_tzgg", "library_gg", "zsb_zskx"];

/// Every known source with its default retention cap and first-run policy.
pub fn catalogue(client: &reqwest::Client) -> Vec<SourceSpec> {
    vec![
        SourceSpec {
            adapter: Box::new(jwc::JwcAdapter::new(
                jwc::JwcBoard::Announcements,
                client.clone(),
            )),
            max_notices: 30,
            first_run: FirstRunPolicy::Notify,
        },
        SourceSpec {
            adapter: Box::new(jwc::JwcAdapter::new(
                jwc::JwcBoard::Notifications,
                client.clone(),
            )),
            max_notices: 30,
            first_run: FirstRunPolicy::Notify,
        },
        SourceSpec {
            adapter: Box::new(xg::XgAdapter::new(client.clone())),
            max_notices: 30,
            first_run: FirstRunPolicy::Notify,
        },
        SourceSpec {
            adapter: Box::new(library::LibraryAdapter::new(client.clone())),
            max_notices: 10,
            first_run: FirstRunPolicy::Notify,
        },
        SourceSpec {
            adapter: Box::new(zsb::ZsbNewsAdapter::new(client.clone())),
            max_notices: 50,
            first_run: FirstRunPolicy::Baseline,
        },
    ]
}

/// Display text (dates): whitespace runs collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<String>())
}

/// Titles are identity keys: only the ends are trimmed, so they compare equal
/// to titles already stored on disk.
pub(crate) fn title_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// In-listing dedup with a log line when pinned repeats were dropped.
pub(crate) fn drop_repeats(source: &str, notices: Vec<Notice>, key: IdentityKey) -> Vec<Notice> {
    let (kept, dropped) = dedup_by_identity(notices, key);
    if dropped > 0 {
        tracing::info!(source, dropped, "dropped repeated notices within one listing");
    }
    kept
}
