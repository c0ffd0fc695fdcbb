// src/ingest/providers/jwc.rs
//! Academic affairs office (教务处) boards. Both boards share one page layout:
//! `ul.n_listxx1 li` rows with the title link and a `span.time` inside `h2`.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::{drop_repeats, element_text, title_text};
use crate::ingest::types::{IdentityKey, Notice, SourceAdapter};
use crate::ingest::{fetch_page, resolve_link};

pub const BASE_URL: &str = "https://jwc.qfnu.edu.cn/";

static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.n_listxx1 li").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h2 a").unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("h2 span.time").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwcBoard {
    /// 公告
    Announcements,
    /// 通知
    Notifications,
}

impl JwcBoard {
    pub fn slug(self) -> &'static str {
        match self {
            JwcBoard::Announcements => "gg",
            JwcBoard::Notifications => "tz",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gg" => Some(JwcBoard::Announcements),
            "tz" => Some(JwcBoard::Notifications),
            _ => None,
        }
    }
}

pub struct JwcAdapter {
    board: JwcBoard,
    url: String,
    client: reqwest::Client,
}

impl JwcAdapter {
    pub fn new(board: JwcBoard, client: reqwest::Client) -> Self {
        Self {
            board,
            url: format!("{BASE_URL}{}_j_.htm", board.slug()),
            client,
        }
    }

    /// Point the adapter at another listing URL (mirrors, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn board(&self) -> JwcBoard {
        self.board
    }

    /// Older listing pages: `{base}{board}_j_/{page}.htm`.
    pub fn page_url(&self, page: u32) -> String {
        format!("{BASE_URL}{}_j_/{page}.htm", self.board.slug())
    }

    pub async fn fetch_url(&self, url: &str) -> Result<String> {
        fetch_page(&self.client, url).await
    }

    pub fn parse_listing(html: &str) -> Vec<Notice> {
        let doc = Html::parse_document(html);
        let mut out = Vec::new();
        for item in doc.select(&ITEM) {
            let Some(a) = item.select(&TITLE).next() else {
                continue;
            };
            let title = title_text(a);
            let Some(href) = a.value().attr("href").filter(|h| !h.trim().is_empty()) else {
                tracing::warn!(%title, "jwc item without href, skipping");
                continue;
            };
            if title.is_empty() {
                tracing::warn!(href, "jwc item with empty title, skipping");
                continue;
            }
            let date = item.select(&TIME).next().map(element_text).unwrap_or_default();
            out.push(Notice::new(title, resolve_link(BASE_URL, href), date));
        }
        drop_repeats("jwc", out, IdentityKey::Title)
    }
}

#[async_trait]
impl SourceAdapter for JwcAdapter {
    fn name(&self) -> &'static str {
        match self.board {
            JwcBoard::Announcements => "jwc_gg",
            JwcBoard::Notifications => "jwc_tz",
        }
    }

    fn display_name(&self) -> &'static str {
        match self.board {
            JwcBoard::Announcements => "曲阜师范大学教务处公告",
            JwcBoard::Notifications => "曲阜师范大学教务处通知",
        }
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
