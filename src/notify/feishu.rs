use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;

use super::{render_entries, DeliveryReport, NoticeBatch, Notifier};
use crate::config::FeishuConfig;

type HmacSha256 = Hmac<Sha256>;

const CHANNEL: &str = "feishu";
const DESCRIPTION_LIMIT: usize = 100;

/// Feishu (Lark) custom bot webhook with signature verification enabled.
pub struct FeishuNotifier {
    cfg: FeishuConfig,
    client: Client,
}

impl FeishuNotifier {
    pub fn new(cfg: FeishuConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building feishu http client")?;
        Ok(Self { cfg, client })
    }

    /// Send a rich-text post. Never fails: problems come back as the report's `error`.
    pub async fn send_post(&self, title: &str, content: &str) -> DeliveryReport {
        let (Some(url), Some(secret)) =
            (self.cfg.webhook_url.as_deref(), self.cfg.secret.as_deref())
        else {
            return DeliveryReport::error(CHANNEL, "feishu webhook not configured");
        };

        let timestamp = chrono::Utc::now().timestamp();
        let sign = match sign(timestamp, secret) {
            Ok(s) => s,
            Err(e) => return DeliveryReport::error(CHANNEL, format!("{e:#}")),
        };
        let body = post_payload(timestamp, &sign, title, content);

        match self.post(url, &body).await {
            Ok(v) => DeliveryReport::ok(CHANNEL, 1, Some(v)),
            Err(e) => DeliveryReport::error(CHANNEL, format!("{e:#}")),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("feishu post")?
            .error_for_status()
            .context("feishu non-2xx")?;
        let v: Value = resp.json().await.context("feishu response json")?;

        // Older bots answer with StatusCode, newer ones with code.
        let code = v
            .get("code")
            .or_else(|| v.get("StatusCode"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if code != 0 {
            let msg = v
                .get("msg")
                .or_else(|| v.get("StatusMessage"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(anyhow!("feishu rejected message (code {code}): {msg}"));
        }
        Ok(v)
    }
}

/// Feishu signature: HMAC-SHA256 keyed with `"{timestamp}\n{secret}"` over an
/// empty message, base64 encoded.
pub fn sign(timestamp: i64, secret: &str) -> Result<String> {
    let string_to_sign = format!("{timestamp}\n{secret}");
    let mac = HmacSha256::new_from_slice(string_to_sign.as_bytes())
        .map_err(|e| anyhow!("feishu hmac key: {e}"))?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn post_payload(timestamp: i64, sign: &str, title: &str, content: &str) -> Value {
    json!({
        "timestamp": timestamp.to_string(),
        "sign": sign,
        "msg_type": "post",
        "content": {
            "post": {
                "zh_cn": {
                    "title": title,
                    "content": [[{ "tag": "text", "text": content }]],
                }
            }
        }
    })
}

#[async_trait::async_trait]
impl Notifier for FeishuNotifier {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    async fn publish(&self, batch: &NoticeBatch<'_>) -> DeliveryReport {
        let content = render_entries(batch.notices, DESCRIPTION_LIMIT, true);
        self.send_post(&batch.title(), &content).await
    }
}
