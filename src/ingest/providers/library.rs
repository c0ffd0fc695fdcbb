// src/ingest/providers/library.rs
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::{drop_repeats, element_text, title_text};
use crate::ingest::types::{IdentityKey, Notice, SourceAdapter};
use crate::ingest::{fetch_page, resolve_link};

pub const BASE_URL: &str = "https://lib.qfnu.edu.cn/";
pub const LIST_URL: &str = "https://lib.qfnu.edu.cn/ggxw/gg.htm";

static ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("ul.list_box_titu li").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h5.overfloat-dot").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static DAY: Lazy<Selector> = Lazy::new(|| Selector::parse("div.time_con h3").unwrap());
static MONTH_YEAR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.time_con h6").unwrap());

/// Library (图书馆) announcements. The page renders the day and the
/// month-year in two separate elements.
pub struct LibraryAdapter {
    url: String,
    client: reqwest::Client,
}

impl LibraryAdapter {
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
            let Some(title_el) = item.select(&TITLE).next() else {
                continue;
            };
            let title = title_text(title_el);
            let href = item
                .select(&LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::trim)
                .unwrap_or_default();
            if title.is_empty() || href.is_empty() {
                tracing::warn!(%title, href, "library item missing title or href, skipping");
                continue;
            }

            let day = item.select(&DAY).next().map(element_text).unwrap_or_default();
            let month_year = item
                .select(&MONTH_YEAR)
                .next()
                .map(element_text)
                .unwrap_or_default();

            out.push(Notice::new(
                title,
                resolve_link(BASE_URL, href),
                join_date(&month_year, &day),
            ));
        }
        drop_repeats("library_gg", out, IdentityKey::Title)
    }
}

/// `"{month_year}-{day}"`, or empty unless both halves are present.
pub fn join_date(month_year: &str, day: &str) -> String {
    if month_year.is_empty() || day.is_empty() {
        return String::new();
    }
    format!("{month_year}-{day}")
}

#[async_trait]
impl SourceAdapter for LibraryAdapter {
    fn name(&self) -> &'static str {
        "library_gg"
    }

    fn display_name(&self) -> &'static str {
        "曲阜师范大学图书馆公告"
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

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<ul class="list_box_titu">
  <li>
    <a href="../info/1121/3310.htm">
      <div class="time_con"><h3>08</h3><h6>2025-10</h6></div>
      <h5 class="overfloat-dot">关于国庆假期开馆时间调整的通知</h5>
    </a>
  </li>
  <li>
    <a href="../info/1121/3309.htm">
      <div class="time_con"><h6>2025-09</h6></div>
      <h5 class="overfloat-dot">数据库试用通知</h5>
    </a>
  </li>
  <li><div class="time_con"><h3>01</h3><h6>2025-09</h6></div></li>
</ul>"#;

    #[test]
    fn concatenates_month_year_and_day() {
        let out = LibraryAdapter::parse_listing(PAGE);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "关于国庆假期开馆时间调整的通知");
        assert_eq!(out[0].date, "2025-10-08");
        assert_eq!(out[0].link, "https://lib.qfnu.edu.cn/info/1121/3310.htm");
        assert_eq!(out[1].date, "");
    }

    #[test]
    fn join_date_requires_both_parts() {
        assert_eq!(join_date("2025-10", "08"), "2025-10-08");
        assert_eq!(join_date("", "08"), "");
        assert_eq!(join_date("2025-10", ""), "");
    }
}
