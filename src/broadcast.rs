//! Broadcaster - fan-out of annotated logs to live subscribers.
//!
//! Thin wrapper over a `tokio::sync::broadcast` channel. Publish delivers
//! to every currently subscribed receiver; there is no per-subscriber
//! queueing beyond the channel's ring buffer, and a slow subscriber that
//! lags simply observes a `Lagged` error on its receiver.

use tokio::sync::broadcast;

use crate::models::AnnotatedLog;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<AnnotatedLog>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver one log to every live subscriber. A send with no subscribers
    /// is fine; the log still goes to persistence.
    pub fn publish(&self, log: &AnnotatedLog) {
        let receivers = self.tx.receiver_count();
        if self.tx.send(log.clone()).is_ok() {
            tracing::trace!(receivers, "log broadcast");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnnotatedLog> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;
    use chrono::Utc;

    fn log(message: &str) -> AnnotatedLog {
        AnnotatedLog {
            level: LogLevel::Info,
            message: message.to_string(),
            service_name: "svc".to_string(),
            timestamp: None,
            is_anomaly: false,
            risk_score: 0,
            attack_type: "None".to_string(),
            analysis: "clean".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_publish() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.publish(&log("one"));
        broadcaster.publish(&log("two"));

        assert_eq!(a.recv().await.unwrap().message, "one");
        assert_eq!(a.recv().await.unwrap().message, "two");
        assert_eq!(b.recv().await.unwrap().message, "one");
        assert_eq!(b.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(&log("nobody listening"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
