//! Ingestion pipeline - per-log orchestration.
//!
//! One call per inbound log: classify (through the cache), merge into an
//! annotated record, broadcast to live subscribers, evaluate alerting, then
//! detach the embed-and-persist tail. Broadcast happens before the
//! persistence task is even spawned, so dashboards never wait on storage
//! latency, and a persistence failure only costs durability for that one
//! record - it is logged and otherwise swallowed.

use std::sync::Arc;

use crate::ai::{Classifier, TextModel};
use crate::alert::AlertDispatcher;
use crate::broadcast::Broadcaster;
use crate::models::{AnnotatedLog, LogEntry, StoredLog};
use crate::store::LogStore;

pub struct IngestionPipeline {
    classifier: Classifier,
    embedder: Arc<dyn TextModel>,
    store: Arc<dyn LogStore>,
    alerts: AlertDispatcher,
    broadcaster: Broadcaster,
}

impl IngestionPipeline {
    pub fn new(
        classifier: Classifier,
        embedder: Arc<dyn TextModel>,
        store: Arc<dyn LogStore>,
        alerts: AlertDispatcher,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            classifier,
            embedder,
            store,
            alerts,
            broadcaster,
        }
    }

    /// Process one inbound log. The returned record is what subscribers
    /// saw; persistence continues in the background after this returns.
    pub async fn ingest(&self, entry: LogEntry) -> AnnotatedLog {
        let verdict = self.classifier.classify(&entry).await;
        let annotated = AnnotatedLog::merge(&entry, verdict);

        if annotated.is_anomaly {
            tracing::warn!(
                service = %annotated.service_name,
                risk = annotated.risk_score,
                attack = %annotated.attack_type,
                "anomalous log ingested"
            );
        } else {
            tracing::info!(service = %annotated.service_name, "clean log ingested");
        }

        // Live subscribers observe the log before persistence starts.
        self.broadcaster.publish(&annotated);

        self.alerts.evaluate(&annotated);

        let embedder = self.embedder.clone();
        let store = self.store.clone();
        let record = annotated.clone();
        tokio::spawn(async move {
            persist(embedder, store, record).await;
        });

        annotated
    }
}

/// Detached persistence tail: embed, then insert. An embedding failure
/// downgrades to a null vector - the log is never dropped for lack of one.
async fn persist(embedder: Arc<dyn TextModel>, store: Arc<dyn LogStore>, log: AnnotatedLog) {
    let embedding = match embedder.embed(&log.embedding_input()).await {
        Ok(vector) => Some(vector),
        Err(err) => {
            tracing::warn!(
                service = %log.service_name,
                %err,
                "embedding failed, persisting without vector"
            );
            None
        }
    };

    let record = StoredLog::from_annotated(&log, embedding);
    if let Err(err) = store.insert(&record).await {
        tracing::error!(service = %log.service_name, %err, "log persistence failed");
    }
}
