// src/ingest/providers/xg.rs
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::{drop_repeats, element_text, title_text};
use crate::ingest::types::{IdentityKey, Notice, SourceAdapter};
use crate::ingest::{fetch_page, normalize_text, resolve_link};

pub const BASE_URL: &str = "https://xg.qfnu.edu.cn/";
pub const LIST_URL: &str = "https://xg.qfnu.edu.cn/tzgg1.htm";

static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("div.list ul li").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Student affairs office (学工处) notices.
pub struct XgAdapter {
    url: String,
    client: reqwest::Client,
}

impl XgAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            url: LIST_URL.to_string(),
            client,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn parse_listing(html: &str) -> Vec<Notice> {
        let doc = Html::parse_document(html);
        let mut out = Vec::new();
        for item in doc.select(&ITEM) {
            let Some(a) = item.select(&LINK).next() else {
                continue;
            };
            let title = title_text(a);
            let Some(href) = a.value().attr("href").filter(|h| !h.trim().is_empty()) else {
                tracing::warn!(%title, "xg item without href, skipping");
                continue;
            };
            if title.is_empty() {
                tracing::warn!(href, "xg item with empty title, skipping");
                continue;
            }
            out.push(Notice::new(title, resolve_link(BASE_URL, href), trailing_text(item)));
        }
        drop_repeats("xg_tzgg", out, IdentityKey::Title)
    }
}

/// The date sits as the last child of the `li`, after the link.
fn trailing_text(item: ElementRef<'_>) -> String {
    let children: Vec<_> = item.children().collect();
    if children.len() < 2 {
        return String::new();
    }
    let Some(last) = children.last() else {
        return String::new();
    };
    if let Some(t) = last.value().as_text() {
        return normalize_text(t);
    }
    ElementRef::wrap(*last).map(element_text).unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for XgAdapter {
    fn name(&self) -> &'static str {
        "xg_tzgg"
    }

    fn display_name(&self) -> &'static str {
        "曲阜师范大学学工处通知公告"
    }

    fn identity_key(&self) -> IdentityKey {
        IdentityKey::Title
    }

    async fn fetch(&self) -> Result<String> {
        fetch_page(&self.client, &self.url).await
    }

    fn extract(&self, raw: &str) -> Result<Vec<Notice>> {
        Ok(Self::parse_listing(raw))
    }
}
