use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{render_entries, DeliveryReport, NoticeBatch, Notifier};
use crate::config::OneBotConfig;

const CHANNEL: &str = "onebot";
const DESCRIPTION_LIMIT: usize = 80;

/// OneBot v11 HTTP relay (QQ group bot). Plain-text messages, one call per group.
pub struct OneBotNotifier {
    cfg: OneBotConfig,
    client: Client,
}

impl OneBotNotifier {
    pub fn new(cfg: OneBotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building onebot http client")?;
        Ok(Self { cfg, client })
    }

    pub async fn send_group_message(&self, group_id: &str, message: &str) -> Result<Value> {
        let base = self
            .cfg
            .http_url
            .as_deref()
            .ok_or_else(|| anyhow!("onebot http url not configured"))?;
        let url = format!("{}/send_group_msg", base.trim_end_matches('/'));

        // go-cqhttp style servers want a numeric id; keep the string otherwise
        let gid = group_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(group_id));
        let mut req = self
            .client
            .post(&url)
            .json(&json!({ "group_id": gid, "message": message }));
        if let Some(token) = self.cfg.access_token.as_deref() {
            req = req.bearer_auth(token);
        }

        let v: Value = req
            .send()
            .await
            .with_context(|| format!("onebot post to group {group_id}"))?
            .error_for_status()
            .context("onebot non-2xx")?
            .json()
            .await
            .context("onebot response json")?;

        let failed = v.get("status").and_then(Value::as_str) == Some("failed")
            || v.get("retcode").and_then(Value::as_i64).is_some_and(|c| c != 0);
        if failed {
            let msg = v
                .get("wording")
                .or_else(|| v.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(anyhow!("onebot rejected message for group {group_id}: {msg}"));
        }
        Ok(v)
    }

    /// Send to an explicit list of groups and aggregate per-group outcomes.
    pub async fn send_to_groups(&self, groups: &[String], message: &str) -> DeliveryReport {
        if self.cfg.http_url.is_none() {
            return DeliveryReport::error(CHANNEL, "onebot http url not configured");
        }
        if groups.is_empty() {
            return DeliveryReport::error(CHANNEL, "no onebot target groups configured");
        }

        let mut delivered = 0usize;
        let mut failed = 0usize;
        let mut results = Vec::with_capacity(groups.len());
        for g in groups {
            match self.send_group_message(g, message).await {
                Ok(_) => {
                    delivered += 1;
                    results.push(json!({ "group_id": g, "ok": true }));
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(group = %g, error = ?e, "onebot group send failed");
                    results.push(json!({ "group_id": g, "ok": false, "error": format!("{e:#}") }));
                }
            }
        }

        let response = json!({
            "success_count": delivered,
            "failed_count": failed,
            "results": results,
        });
        DeliveryReport {
            channel: CHANNEL,
            delivered,
            failed,
            error: (delivered == 0).then(|| format!("all {failed} onebot groups failed")),
            response: Some(response),
        }
    }

    pub async fn send_to_all_groups(&self, message: &str) -> DeliveryReport {
        self.send_to_groups(&self.cfg.target_groups, message).await
    }
}

pub fn render_message(batch: &NoticeBatch<'_>) -> String {
    format!(
        "{}\n\n{}",
        batch.title(),
        render_entries(batch.notices, DESCRIPTION_LIMIT, false)
    )
}

#[async_trait::async_trait]
impl Notifier for OneBotNotifier {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    async fn publish(&self, batch: &NoticeBatch<'_>) -> DeliveryReport {
        self.send_to_all_groups(&render_message(batch)).await
    }
}
