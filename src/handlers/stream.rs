//! Live log stream handler - Server-Sent Events subscription.
//!
//! A new subscriber first receives one `init_history` event with the most
//! recent persisted records (newest first), then a `new_log` event per
//! ingested log. The broadcast subscription is taken before the history
//! read so a log ingested during the read is not missed.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;

use crate::models::{AnnotatedLog, StoredLog};
use crate::store::LogStore;
use crate::AppState;

/// History batch size delivered once on join.
const HISTORY_LIMIT: usize = 50;

/// One message on a subscriber's stream, before SSE encoding.
#[derive(Debug)]
pub enum StreamMessage {
    /// Delivered exactly once, first, on join.
    InitHistory(Vec<StoredLog>),
    /// One per ingested log after the history batch.
    NewLog(AnnotatedLog),
    /// The subscriber fell behind and `n` logs were dropped.
    Lagged(u64),
}

pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let rx = state.broadcaster.subscribe();
    let history = load_history(state.store.as_ref()).await;

    tracing::info!(
        history = history.len(),
        subscribers = state.broadcaster.subscriber_count(),
        "stream subscriber joined"
    );

    let stream = subscriber_messages(history, rx).map(|msg| Ok(to_event(msg)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// Recent history for a joining subscriber. A store failure degrades to an
/// empty batch; the live stream still works, so joining must not error.
async fn load_history(store: &dyn LogStore) -> Vec<StoredLog> {
    match store.recent(HISTORY_LIMIT).await {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(%err, "history read failed, subscriber joins with empty history");
            Vec::new()
        }
    }
}

/// The per-subscriber message sequence: history batch first, then live logs
/// until the broadcaster shuts down.
fn subscriber_messages(
    history: Vec<StoredLog>,
    mut rx: broadcast::Receiver<AnnotatedLog>,
) -> impl Stream<Item = StreamMessage> + Send + 'static {
    async_stream::stream! {
        yield StreamMessage::InitHistory(history);

        loop {
            match rx.recv().await {
                Ok(log) => yield StreamMessage::NewLog(log),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield StreamMessage::Lagged(n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn to_event(msg: StreamMessage) -> Event {
    let (name, payload) = match &msg {
        StreamMessage::InitHistory(records) => ("init_history", serde_json::to_string(records)),
        StreamMessage::NewLog(log) => ("new_log", serde_json::to_string(log)),
        StreamMessage::Lagged(n) => ("lagged", Ok(format!("{} logs dropped", n))),
    };

    match payload {
        Ok(data) => Event::default().event(name).data(data),
        Err(err) => {
            tracing::error!(%err, event = name, "event serialization failed");
            Event::default().comment("serialization error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::models::LogLevel;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FixedStore {
        records: Result<Vec<StoredLog>, ()>,
    }

    #[async_trait]
    impl LogStore for FixedStore {
        async fn insert(&self, _record: &StoredLog) -> Result<(), StoreError> {
            Ok(())
        }

        async fn nearest_neighbors(
            &self,
            _query: &[f32],
            _threshold: f32,
            _count: usize,
        ) -> Result<Vec<StoredLog>, StoreError> {
            Ok(vec![])
        }

        async fn recent(&self, limit: usize) -> Result<Vec<StoredLog>, StoreError> {
            assert_eq!(limit, HISTORY_LIMIT);
            self.records
                .clone()
                .map_err(|_| StoreError::Request("store down".to_string()))
        }
    }

    fn stored(message: &str) -> StoredLog {
        StoredLog {
            id: None,
            level: LogLevel::Info,
            message: message.to_string(),
            is_anomaly: false,
            analysis: "clean".to_string(),
            service_name: "svc".to_string(),
            risk_score: 0,
            attack_type: "None".to_string(),
            created_at: Utc::now(),
            embedding: None,
        }
    }

    fn annotated(message: &str) -> AnnotatedLog {
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
    async fn subscriber_gets_history_batch_first_then_live_logs() {
        let broadcaster = Broadcaster::new();
        let rx = broadcaster.subscribe();
        let history = vec![stored("newest"), stored("older")];

        let mut stream = Box::pin(subscriber_messages(history, rx));

        broadcaster.publish(&annotated("live one"));
        broadcaster.publish(&annotated("live two"));

        match stream.next().await.unwrap() {
            StreamMessage::InitHistory(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].message, "newest");
            }
            other => panic!("expected history first, got {:?}", other),
        }

        match stream.next().await.unwrap() {
            StreamMessage::NewLog(log) => assert_eq!(log.message, "live one"),
            other => panic!("expected live log, got {:?}", other),
        }
        match stream.next().await.unwrap() {
            StreamMessage::NewLog(log) => assert_eq!(log.message, "live two"),
            other => panic!("expected live log, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_history_is_an_explicit_empty_batch() {
        let broadcaster = Broadcaster::new();
        let mut stream = Box::pin(subscriber_messages(vec![], broadcaster.subscribe()));

        match stream.next().await.unwrap() {
            StreamMessage::InitHistory(records) => assert!(records.is_empty()),
            other => panic!("expected history first, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty_history() {
        let store = FixedStore { records: Err(()) };
        assert!(load_history(&store).await.is_empty());
    }

    #[tokio::test]
    async fn history_read_passes_through_store_records() {
        let store = FixedStore {
            records: Ok(vec![stored("kept")]),
        };
        let history = load_history(&store).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "kept");
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told_how_much_it_missed() {
        let broadcaster = Broadcaster::new();
        let rx = broadcaster.subscribe();

        // Overrun the channel's ring buffer before the subscriber polls.
        for i in 0..300 {
            broadcaster.publish(&annotated(&format!("log {}", i)));
        }

        let mut stream = Box::pin(subscriber_messages(vec![], rx));

        assert!(matches!(
            stream.next().await.unwrap(),
            StreamMessage::InitHistory(_)
        ));
        match stream.next().await.unwrap() {
            StreamMessage::Lagged(n) => assert!(n > 0),
            other => panic!("expected lag notice, got {:?}", other),
        }
    }
}
