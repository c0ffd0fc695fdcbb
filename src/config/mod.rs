// src/config/mod.rs
//! Notification channel settings, read once at startup and passed down.

use anyhow::{anyhow, bail, Result};
use reqwest::Url;

pub const ENV_FEISHU_BOT_URL: &str = "FEISHU_BOT_URL";
pub const ENV_FEISHU_BOT_SECRET: &str = "FEISHU_BOT_SECRET";
pub const ENV_ONEBOT_HTTP_URL: &str = "ONEBOT_HTTP_URL";
pub const ENV_ONEBOT_TARGET_GROUPS: &str = "ONEBOT_TARGET_GROUPS";
pub const ENV_ONEBOT_ACCESS_TOKEN: &str = "ONEBOT_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeishuConfig {
    pub webhook_url: Option<String>,
    pub secret: Option<String>,
}

impl FeishuConfig {
    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some() && self.secret.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneBotConfig {
    pub http_url: Option<String>,
    pub target_groups: Vec<String>,
    pub access_token: Option<String>,
}

impl OneBotConfig {
    pub fn is_configured(&self) -> bool {
        self.http_url.is_some() && !self.target_groups.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorConfig {
    pub feishu: FeishuConfig,
    pub onebot: OneBotConfig,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Malformed values are rejected here; absent
    /// values are allowed and surface later as channel error reports.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let feishu = FeishuConfig {
            webhook_url: var(ENV_FEISHU_BOT_URL)
                .map(|u| check_url(ENV_FEISHU_BOT_URL, u))
                .transpose()?,
            secret: var(ENV_FEISHU_BOT_SECRET),
        };

        let onebot = OneBotConfig {
            http_url: var(ENV_ONEBOT_HTTP_URL)
                .map(|u| check_url(ENV_ONEBOT_HTTP_URL, u))
                .transpose()?,
            target_groups: parse_groups(var(ENV_ONEBOT_TARGET_GROUPS).as_deref().unwrap_or(""))?,
            access_token: var(ENV_ONEBOT_ACCESS_TOKEN),
        };

        Ok(Self { feishu, onebot })
    }

    /// Startup summary; never prints secrets.
    pub fn log_summary(&self) {
        if self.feishu.is_configured() {
            tracing::info!("feishu channel configured");
        } else {
            tracing::warn!(
                "feishu channel incomplete (FEISHU_BOT_URL / FEISHU_BOT_SECRET); \
                 sends will be reported as errors"
            );
        }
        if self.onebot.is_configured() {
            tracing::info!(groups = self.onebot.target_groups.len(), "onebot channel configured");
        } else {
            tracing::warn!(
                "onebot channel incomplete (ONEBOT_HTTP_URL / ONEBOT_TARGET_GROUPS); \
                 sends will be reported as errors"
            );
        }
    }
}

fn check_url(key: &str, raw: String) -> Result<String> {
    let u = Url::parse(&raw).map_err(|e| anyhow!("{key} is not a valid URL: {e}"))?;
    if !matches!(u.scheme(), "http" | "https") {
        bail!("{key} must be an http(s) URL");
    }
    Ok(raw)
}

/// Comma separated numeric group ids; blanks are ignored, order kept, repeats dropped.
pub fn parse_groups(raw: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for g in raw.split(',').map(str::trim).filter(|g| !g.is_empty()) {
        if !g.chars().all(|c| c.is_ascii_digit()) {
            bail!("{ENV_ONEBOT_TARGET_GROUPS} contains non-numeric group id {g:?}");
        }
        if !out.iter().any(|x| x == g) {
            out.push(g.to_string());
        }
    }
    Ok(out)
}
