// src/ingest/providers/zsb.rs
//! Admissions office (招生办) news flash, served by a JSON endpoint instead of
//! a static listing page.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

use super::drop_repeats;
use crate::ingest::resolve_link;
use crate::ingest::types::{IdentityKey, Notice, SourceAdapter};

pub const BASE_URL: &str = "https://zsb.qfnu.edu.cn";
pub const API_URL: &str = "https://zsb.qfnu.edu.cn/f/newsCenter/ajax_category_article_list";
pub const CATEGORY_ID: &str = "e8659322e16240d296178402510b34f2";
pub const PAGE_SIZE: u32 = 20;

const CST_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    state: Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default, rename = "contentList")]
    content_list: Vec<Value>,
}

/// Optional fields arrive as `null` or stringified numbers; they are coerced
/// field by field instead of rejecting the item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    id: Option<Value>,
    title: Option<String>,
    url: Option<String>,
    is_external_link: Option<Value>,
    external_link_url: Option<String>,
    release_date: Option<Value>,
    description: Option<String>,
    publisher: Option<String>,
    hits: Option<Value>,
    is_new: Option<Value>,
}

pub struct ZsbNewsAdapter {
    api_url: String,
    client: reqwest::Client,
}

impl ZsbNewsAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            api_url: API_URL.to_string(),
            client,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn parse_payload(raw: &str) -> Result<Vec<Notice>> {
        let resp: ApiResponse =
            serde_json::from_str(raw).context("parsing admissions api json")?;
        if resp.state.as_i64() != Some(1) {
            return Err(anyhow!(
                "admissions api returned state {}: {}",
                resp.state,
                resp.msg.as_deref().unwrap_or("unknown error")
            ));
        }

        let Some(first) = resp.data.into_iter().next() else {
            tracing::warn!("admissions api returned empty data");
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(first.content_list.len());
        for (idx, raw_item) in first.content_list.into_iter().enumerate() {
            match map_item(raw_item) {
                Ok(Some(n)) => out.push(n),
                Ok(None) => tracing::debug!(idx, "admissions item without id or title"),
                Err(e) => tracing::warn!(idx, error = ?e, "skipping malformed admissions item"),
            }
        }
        Ok(drop_repeats("zsb_zskx", out, IdentityKey::NativeId))
    }
}

fn map_item(raw: Value) -> Result<Option<Notice>> {
    let it: ApiItem = serde_json::from_value(raw).context("admissions item shape")?;

    let id = match it.id {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let title = it.title.as_deref().map(str::trim).unwrap_or_default().to_string();
    if id.is_empty() || title.is_empty() {
        return Ok(None);
    }

    let mut link = it
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .map(|u| resolve_link(BASE_URL, u))
        .unwrap_or_default();
    if as_bool(it.is_external_link.as_ref()) {
        if let Some(ext) = it.external_link_url.as_deref().filter(|u| !u.trim().is_empty()) {
            link = resolve_link(BASE_URL, ext);
        }
    }

    let release = as_i64(it.release_date.as_ref()).unwrap_or(0);
    Ok(Some(Notice {
        id: Some(id),
        title,
        link,
        date: format_release_date(release),
        description: Some(it.description.unwrap_or_default().trim().to_string()),
        publisher: Some(it.publisher.unwrap_or_default()),
        hits: Some(as_i64(it.hits.as_ref()).and_then(|h| u64::try_from(h).ok()).unwrap_or(0)),
        is_new: Some(as_bool(it.is_new.as_ref())),
        release_timestamp: Some(release),
    }))
}

/// `true`, `1`, `"true"` and `"1"` are true; anything else, null included, is false.
fn as_bool(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
        _ => false,
    }
}

/// Integer from a JSON number or a numeric string.
fn as_i64(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Millisecond unix timestamp to `%Y-%m-%d` in China Standard Time; 0 → empty.
pub fn format_release_date(ms: i64) -> String {
    if ms <= 0 {
        return String::new();
    }
    let Some(offset) = FixedOffset::east_opt(CST_OFFSET_SECS) else {
        return String::new();
    };
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&offset).format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for ZsbNewsAdapter {
    fn name(&self) -> &'static str {
        "zsb_zskx"
    }

    fn display_name(&self) -> &'static str {
        "曲师大招生办招生快讯"
    }

    fn identity_key(&self) -> IdentityKey {
        IdentityKey::NativeId
    }

    async fn fetch(&self) -> Result<String> {
        let ts = chrono::Utc::now().timestamp_millis().to_string();
        let url = format!("{}?ts={ts}", self.api_url);
        let page_size = PAGE_SIZE.to_string();

        // The shared client is built without decompression, so no Accept-Encoding here.
        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-Requested-Time", ts.as_str())
            .header("Origin", BASE_URL)
            .header("Referer", format!("{BASE_URL}/"))
            .header("Accept-Language", "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7")
            .form(&[("categoryId", CATEGORY_ID), ("pageSize", page_size.as_str())])
            .send()
            .await
            .context("admissions api post")?
            .error_for_status()
            .context("admissions api non-2xx")?;
        let bytes = resp.bytes().await.context("reading admissions api body")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn extract(&self, raw: &str) -> Result<Vec<Notice>> {
        Self::parse_payload(raw)
    }
}
