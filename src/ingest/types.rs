// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One announcement as scraped from a listing page or returned by the admissions API.
///
/// Page-scrape sources only fill `title`, `link` and `date`. The extended fields
/// are present for API-backed sources and skipped on disk when absent, so the
/// persisted JSON stays compatible with files written by older monitors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Notice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub date: String, // free-form display date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_timestamp: Option<i64>, // unix millis
}

impl Notice {
    pub fn new(title: impl Into<String>, link: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            date: date.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn has_extended_fields(&self) -> bool {
        self.description.is_some()
            || self.publisher.is_some()
            || self.hits.is_some()
            || self.is_new.is_some()
    }
}

/// Which field decides whether two notices are "the same announcement".
///
/// Switching a source between policies changes dedup semantics: under `Title`
/// a renamed announcement is new, under `NativeId` it is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    Title,
    NativeId,
}

impl IdentityKey {
    /// `NativeId` falls back to the title for records that carry no id.
    pub fn of<'a>(&self, n: &'a Notice) -> &'a str {
        match self {
            IdentityKey::Title => n.title.as_str(),
            IdentityKey::NativeId => n.id.as_deref().unwrap_or(n.title.as_str()),
        }
    }
}

/// A monitored website or API endpoint.
///
/// `fetch` performs exactly one outbound request; `extract` is pure so tests can
/// feed fixtures straight into it.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable short name, used as the data file prefix (e.g. `jwc_gg`).
    fn name(&self) -> &'static str;
    /// Human readable name used in notification titles.
    fn display_name(&self) -> &'static str;
    fn identity_key(&self) -> IdentityKey;
    async fn fetch(&self) -> Result<String>;
    fn extract(&self, raw: &str) -> Result<Vec<Notice>>;
}
