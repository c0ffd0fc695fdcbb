// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{IdentityKey, Notice};
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::Url;
use std::collections::HashSet;
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client for source fetches: browser-like UA and a bounded timeout, no retries.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("building source http client")
}

/// GET a listing page and decode it as UTF-8 regardless of the declared charset.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} non-2xx"))?;
    let bytes = resp.bytes().await.context("reading page body")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalize scraped text: collapse whitespace runs and trim.
pub fn normalize_text(s: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(s, " ").trim().to_string()
}

/// Resolve a possibly relative href against a site base URL.
/// Absolute `http(s)` links pass through untouched.
pub fn resolve_link(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http") {
        return href.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            href.trim_start_matches('/')
        ),
    }
}

/// `current \ saved` keyed by identity, in `current` order.
/// With no saved history every current notice is new.
pub fn find_new(current: &[Notice], saved: &[Notice], key: IdentityKey) -> Vec<Notice> {
    if saved.is_empty() {
        return current.to_vec();
    }
    let seen: HashSet<&str> = saved.iter().map(|n| key.of(n)).collect();
    current
        .iter()
        .filter(|n| !seen.contains(key.of(n)))
        .cloned()
        .collect()
}

/// Drop repeated identities inside one listing (pinned items often appear twice).
/// Returns the kept list and how many were dropped.
pub fn dedup_by_identity(notices: Vec<Notice>, key: IdentityKey) -> (Vec<Notice>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(notices.len());
    let mut dropped = 0usize;
    for n in notices {
        if !seen.insert(key.of(&n).to_string()) {
            dropped += 1;
            continue;
        }
        keep.push(n);
    }
    (keep, dropped)
}
