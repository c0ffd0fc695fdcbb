// src/notify/mod.rs
pub mod feishu;
pub mod onebot;

use metrics::counter;
use serde_json::Value;

use crate::config::MonitorConfig;
use crate::ingest::types::Notice;

/// A batch of freshly discovered notices from one source.
#[derive(Debug, Clone, Copy)]
pub struct NoticeBatch<'a> {
    pub source: &'a str,
    pub notices: &'a [Notice],
}

impl NoticeBatch<'_> {
    pub fn title(&self) -> String {
        format!("📢 {}有{}条新公告", self.source, self.notices.len())
    }
}

/// Outcome of one channel publish. Channels never return `Err`; failures are
/// described here so callers can log them uniformly.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub channel: &'static str,
    pub delivered: usize,
    pub failed: usize,
    pub error: Option<String>,
    pub response: Option<Value>,
}

impl DeliveryReport {
    pub fn ok(channel: &'static str, delivered: usize, response: Option<Value>) -> Self {
        Self {
            channel,
            delivered,
            failed: 0,
            error: None,
            response,
        }
    }

    pub fn error(channel: &'static str, msg: impl Into<String>) -> Self {
        Self {
            channel,
            delivered: 0,
            failed: 0,
            error: Some(msg.into()),
            response: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, batch: &NoticeBatch<'_>) -> DeliveryReport;
}

/// Fans a batch out to every configured channel. One channel failing never
/// keeps the others from being attempted.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn from_config(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        Ok(Self::new(vec![
            Box::new(feishu::FeishuNotifier::new(cfg.feishu.clone())?),
            Box::new(onebot::OneBotNotifier::new(cfg.onebot.clone())?),
        ]))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn publish(&self, batch: &NoticeBatch<'_>) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(self.channels.len());
        for ch in &self.channels {
            let report = ch.publish(batch).await;
            match &report.error {
                None => {
                    counter!("notify_deliveries_total", "channel" => ch.name()).increment(1);
                    tracing::info!(
                        channel = ch.name(),
                        delivered = report.delivered,
                        failed = report.failed,
                        "notification sent"
                    );
                }
                Some(err) => {
                    counter!("notify_failures_total", "channel" => ch.name()).increment(1);
                    tracing::error!(channel = ch.name(), error = %err, "notification failed");
                }
            }
            reports.push(report);
        }
        reports
    }
}

/// Render a numbered list of notices. `desc_limit` caps the description length
/// in characters; extended fields only show when the source provided them.
pub fn render_entries(notices: &[Notice], desc_limit: usize, link_label: bool) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    for (i, n) in notices.iter().enumerate() {
        let extended = n.has_extended_fields();
        let _ = writeln!(out, "【{}】{}", i + 1, n.title);
        if extended {
            let _ = writeln!(out, "📅 发布时间：{}", n.date);
        } else {
            let _ = writeln!(out, "📅 {}", n.date);
        }
        if let Some(p) = n.publisher.as_deref().filter(|p| !p.is_empty()) {
            let _ = writeln!(out, "👤 发布者：{p}");
        }
        if let Some(h) = n.hits.filter(|h| *h > 0) {
            let _ = writeln!(out, "👁️ 浏览量：{h}");
        }
        if n.is_new == Some(true) {
            out.push_str("🆕 最新公告\n");
        }
        if let Some(d) = n.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "📝 简介：{}", truncate_chars(d, desc_limit));
        }
        if extended && link_label {
            let _ = writeln!(out, "🔗 链接：{}\n", n.link);
        } else {
            let _ = writeln!(out, "🔗 {}\n", n.link);
        }
    }
    out
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut t: String = s.chars().take(max).collect();
    t.push_str("...");
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing;
    struct Counting(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn publish(&self, _batch: &NoticeBatch<'_>) -> DeliveryReport {
            DeliveryReport::error("failing", "webhook not configured")
        }
    }

    #[async_trait::async_trait]
    impl Notifier for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn publish(&self, batch: &NoticeBatch<'_>) -> DeliveryReport {
            self.0.fetch_add(batch.notices.len(), Ordering::SeqCst);
            DeliveryReport::ok("counting", 1, None)
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_the_next() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(vec![Box::new(Failing), Box::new(Counting(hits.clone()))]);
        let notices = vec![Notice::new("A", "https://x.test/a", "2025-01-01")];
        let reports = mux
            .publish(&NoticeBatch {
                source: "测试",
                notices: &notices,
            })
            .await;
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].is_ok());
        assert!(reports[1].is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plain_notices_render_without_extended_lines() {
        let notices = vec![
            Notice::new("补考安排", "https://jwc.qfnu.edu.cn/1.htm", "2025-03-01"),
            Notice::new("选课公告", "https://jwc.qfnu.edu.cn/2.htm", "2025-02-20"),
        ];
        let text = render_entries(&notices, 100, true);
        assert_eq!(
            text,
            "【1】补考安排\n📅 2025-03-01\n🔗 https://jwc.qfnu.edu.cn/1.htm\n\n\
             【2】选课公告\n📅 2025-02-20\n🔗 https://jwc.qfnu.edu.cn/2.htm\n\n"
        );
    }

    #[test]
    fn extended_fields_are_prefixed_and_description_truncated() {
        let n = Notice {
            publisher: Some("招生办".into()),
            hits: Some(12),
            is_new: Some(true),
            description: Some("一".repeat(120)),
            ..Notice::new("章程", "https://zsb.qfnu.edu.cn/a", "2025-07-01").with_id("a")
        };
        let text = render_entries(std::slice::from_ref(&n), 100, true);
        assert!(text.contains("📅 发布时间：2025-07-01"));
        assert!(text.contains("👤 发布者：招生办"));
        assert!(text.contains("👁️ 浏览量：12"));
        assert!(text.contains("🆕 最新公告"));
        assert!(text.contains(&format!("📝 简介：{}...", "一".repeat(100))));
        assert!(text.contains("🔗 链接：https://zsb.qfnu.edu.cn/a"));

        let short = render_entries(std::slice::from_ref(&n), 80, false);
        assert!(short.contains(&format!("📝 简介：{}...", "一".repeat(80))));
        assert!(short.contains("🔗 https://zsb.qfnu.edu.cn/a"));
    }

    #[test]
    fn batch_title_counts_notices() {
        let notices = vec![Notice::default(), Notice::default()];
        let b = NoticeBatch {
            source: "曲阜师范大学图书馆公告",
            notices: &notices,
        };
        assert_eq!(b.title(), "📢 曲阜师范大学图书馆公告有2条新公告");
    }
}
