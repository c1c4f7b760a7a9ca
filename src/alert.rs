//! Alert dispatch - threshold policy plus fire-and-forget webhook delivery.
//!
//! Alerts fire for `risk_score >= 75` or a CRITICAL source level; everything
//! below that threshold is deliberately suppressed to keep the channel
//! quiet. Delivery runs on a detached task and failures are only logged -
//! alerting is best-effort and never feeds back into ingestion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use crate::models::{AnnotatedLog, LogLevel};

/// Minimum risk score that triggers an alert on its own.
pub const RISK_THRESHOLD: u8 = 75;

/// Structured notification pushed to the external channel.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub title: String,
    pub description: String,
    pub risk_score: u8,
    pub attack_type: String,
}

impl AlertPayload {
    fn from_log(log: &AnnotatedLog) -> Self {
        Self {
            title: format!("🚨 THREAT: {}", log.service_name),
            description: log.analysis.clone(),
            risk_score: log.risk_score,
            attack_type: log.attack_type.clone(),
        }
    }
}

/// Delivery transport for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &AlertPayload) -> Result<(), String>;
}

/// Discord-compatible webhook sink.
pub struct DiscordWebhook {
    client: Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl AlertSink for DiscordWebhook {
    async fn notify(&self, alert: &AlertPayload) -> Result<(), String> {
        let body = json!({
            "username": "Sentinel AI",
            "embeds": [{
                "title": alert.title,
                "description": alert.description,
                "color": 15548997,
                "fields": [
                    { "name": "Risk", "value": format!("{}%", alert.risk_score), "inline": true },
                    { "name": "Type", "value": alert.attack_type, "inline": true }
                ]
            }]
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("webhook returned {}", response.status()));
        }

        Ok(())
    }
}

/// Evaluates the alert policy once per ingested log and hands matching logs
/// to the sink. A dispatcher without a sink (no webhook configured) is a
/// permanent no-op.
pub struct AlertDispatcher {
    sink: Option<Arc<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new(sink: Option<Arc<dyn AlertSink>>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Apply the noise-reduction policy and, on a match, deliver on a
    /// detached task. Returns whether an alert was dispatched.
    pub fn evaluate(&self, log: &AnnotatedLog) -> bool {
        if !should_alert(log) {
            return false;
        }

        let Some(sink) = self.sink.clone() else {
            return false;
        };

        let payload = AlertPayload::from_log(log);
        tokio::spawn(async move {
            if let Err(err) = sink.notify(&payload).await {
                tracing::warn!(%err, "alert delivery failed");
            }
        });

        true
    }
}

fn should_alert(log: &AnnotatedLog) -> bool {
    log.risk_score >= RISK_THRESHOLD || log.level == LogLevel::Critical
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc;

    struct ChannelSink {
        tx: mpsc::UnboundedSender<AlertPayload>,
    }

    #[async_trait]
    impl AlertSink for ChannelSink {
        async fn notify(&self, alert: &AlertPayload) -> Result<(), String> {
            self.tx.send(alert.clone()).map_err(|e| e.to_string())
        }
    }

    fn log(level: LogLevel, risk_score: u8) -> AnnotatedLog {
        AnnotatedLog {
            level,
            message: "failed login x50".to_string(),
            service_name: "AUTH-SERVICE".to_string(),
            timestamp: None,
            is_anomaly: risk_score >= 50,
            risk_score,
            attack_type: "Brute Force".to_string(),
            analysis: "repeated failures".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn policy_threshold_boundaries() {
        assert!(!should_alert(&log(LogLevel::Error, 74)));
        assert!(should_alert(&log(LogLevel::Error, 75)));
        assert!(should_alert(&log(LogLevel::Error, 90)));
        // CRITICAL alerts regardless of score.
        assert!(should_alert(&log(LogLevel::Critical, 0)));
    }

    #[tokio::test]
    async fn matching_log_reaches_the_sink_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = AlertDispatcher::new(Some(Arc::new(ChannelSink { tx })));

        assert!(dispatcher.evaluate(&log(LogLevel::Error, 90)));

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.risk_score, 90);
        assert_eq!(alert.attack_type, "Brute Force");
        assert!(alert.title.contains("AUTH-SERVICE"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn below_threshold_is_a_no_op() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = AlertDispatcher::new(Some(Arc::new(ChannelSink { tx })));

        assert!(!dispatcher.evaluate(&log(LogLevel::Warning, 40)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatcher_without_sink_never_alerts() {
        let dispatcher = AlertDispatcher::disabled();
        assert!(!dispatcher.evaluate(&log(LogLevel::Critical, 100)));
    }
}
