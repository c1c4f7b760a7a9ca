//! Chat engine - retrieval-augmented answers over the log history.
//!
//! Embed the question, pull the nearest stored logs, build a grounded
//! context block, generate once. Unlike the ingestion path, an embedding
//! failure here is fatal to the request: without a query vector there is
//! nothing to ground the answer in.

use std::sync::Arc;

use crate::ai::{LlmError, TextModel};
use crate::models::StoredLog;
use crate::store::{LogStore, StoreError};

/// Deliberately permissive similarity threshold: recall over precision, so
/// vague or mixed-language phrasings still surface related logs.
const MATCH_THRESHOLD: f32 = 0.15;
const MATCH_COUNT: usize = 5;

const EMPTY_CONTEXT: &str = "No specific logs found related to this query in recent history.";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("could not understand question: {0}")]
    QuestionEmbedding(LlmError),
    #[error("log retrieval failed: {0}")]
    Retrieval(#[from] StoreError),
    #[error("answer generation failed: {0}")]
    Generation(LlmError),
}

pub struct ChatEngine {
    model: Arc<dyn TextModel>,
    store: Arc<dyn LogStore>,
}

impl ChatEngine {
    pub fn new(model: Arc<dyn TextModel>, store: Arc<dyn LogStore>) -> Self {
        Self { model, store }
    }

    /// Answer one free-form question against the accumulated log history.
    pub async fn answer(&self, question: &str) -> Result<String, ChatError> {
        let vector = self
            .model
            .embed(question)
            .await
            .map_err(ChatError::QuestionEmbedding)?;

        let matches = self
            .store
            .nearest_neighbors(&vector, MATCH_THRESHOLD, MATCH_COUNT)
            .await?;

        tracing::debug!(matches = matches.len(), "chat retrieval complete");

        let context = build_context(&matches);
        let prompt = build_prompt(question, &context);

        self.model
            .generate(&prompt)
            .await
            .map_err(ChatError::Generation)
    }
}

/// Concatenate matches in store order (best first). An empty result set
/// becomes an explicit placeholder so the model is told not to fabricate
/// findings.
fn build_context(matches: &[StoredLog]) -> String {
    if matches.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    matches
        .iter()
        .map(|log| {
            format!(
                "[{}] Service: {} | Msg: {} | Analysis: {}",
                log.created_at.to_rfc3339(),
                log.service_name,
                log.message,
                log.analysis
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Role: Sentinel AI (Cybersecurity Assistant).\n\
         Personality: Professional, helpful, concise, and smart.\n\
         \n\
         Capabilities:\n\
         1. You understand both Indonesian (Bahasa) and English perfectly.\n\
         2. Even if the user uses slang, informal language, or vague terms, you must infer their intent.\n\
         \n\
         User Question: \"{question}\"\n\
         \n\
         Database Logs Context (Fact Source):\n\
         {context}\n\
         \n\
         Instructions:\n\
         - Analyze the \"Database Logs Context\" to answer the user's question.\n\
         - Answer in the same language the question was asked in.\n\
         - If no logs are found, politely say that everything looks safe based on recent data.\n\
         - Explain technical terms simply if the user seems confused."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubModel {
        fail_embed: bool,
        generate_calls: AtomicUsize,
        last_prompt: parking_lot::Mutex<String>,
    }

    impl StubModel {
        fn new(fail_embed: bool) -> Self {
            Self {
                fail_embed,
                generate_calls: AtomicUsize::new(0),
                last_prompt: parking_lot::Mutex::new(String::new()),
            }
        }
    }

    #[async_trait]
    impl TextModel for StubModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock() = prompt.to_string();
            Ok("grounded answer".to_string())
        }

        async fn generate_json(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok("{}".to_string())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            if self.fail_embed {
                Err(LlmError::ServerError("embedder down".to_string()))
            } else {
                Ok(vec![0.5; 8])
            }
        }
    }

    struct FixedStore {
        matches: Vec<StoredLog>,
    }

    #[async_trait]
    impl LogStore for FixedStore {
        async fn insert(&self, _record: &StoredLog) -> Result<(), StoreError> {
            Ok(())
        }

        async fn nearest_neighbors(
            &self,
            _query: &[f32],
            threshold: f32,
            count: usize,
        ) -> Result<Vec<StoredLog>, StoreError> {
            assert_eq!(threshold, MATCH_THRESHOLD);
            assert_eq!(count, MATCH_COUNT);
            Ok(self.matches.clone())
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<StoredLog>, StoreError> {
            Ok(vec![])
        }
    }

    fn stored(service: &str, message: &str, analysis: &str) -> StoredLog {
        StoredLog {
            id: None,
            level: LogLevel::Error,
            message: message.to_string(),
            is_anomaly: true,
            analysis: analysis.to_string(),
            service_name: service.to_string(),
            risk_score: 80,
            attack_type: "Brute Force".to_string(),
            created_at: Utc::now(),
            embedding: None,
        }
    }

    #[tokio::test]
    async fn answer_grounds_prompt_in_retrieved_logs() {
        let model = Arc::new(StubModel::new(false));
        let store = Arc::new(FixedStore {
            matches: vec![stored("AUTH", "failed login x50", "credential stuffing")],
        });
        let engine = ChatEngine::new(model.clone(), store);

        let answer = engine.answer("what happened to auth?").await.unwrap();
        assert_eq!(answer, "grounded answer");

        let prompt = model.last_prompt.lock().clone();
        assert!(prompt.contains("Service: AUTH"));
        assert!(prompt.contains("credential stuffing"));
        assert!(prompt.contains("what happened to auth?"));
    }

    #[tokio::test]
    async fn zero_matches_still_answers_with_explicit_empty_context() {
        let model = Arc::new(StubModel::new(false));
        let engine = ChatEngine::new(model.clone(), Arc::new(FixedStore { matches: vec![] }));

        let answer = engine.answer("any threats today?").await.unwrap();
        assert_eq!(answer, "grounded answer");
        assert!(model.last_prompt.lock().contains(EMPTY_CONTEXT));
    }

    #[tokio::test]
    async fn embedding_failure_is_fatal_and_skips_generation() {
        let model = Arc::new(StubModel::new(true));
        let engine = ChatEngine::new(model.clone(), Arc::new(FixedStore { matches: vec![] }));

        let err = engine.answer("kok error?").await.unwrap_err();
        assert!(matches!(err, ChatError::QuestionEmbedding(_)));
        assert_eq!(model.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_retrieval_error() {
        struct BrokenStore;

        #[async_trait]
        impl LogStore for BrokenStore {
            async fn insert(&self, _record: &StoredLog) -> Result<(), StoreError> {
                Ok(())
            }
            async fn nearest_neighbors(
                &self,
                _query: &[f32],
                _threshold: f32,
                _count: usize,
            ) -> Result<Vec<StoredLog>, StoreError> {
                Err(StoreError::Request("down".to_string()))
            }
            async fn recent(&self, _limit: usize) -> Result<Vec<StoredLog>, StoreError> {
                Ok(vec![])
            }
        }

        let engine = ChatEngine::new(Arc::new(StubModel::new(false)), Arc::new(BrokenStore));
        let err = engine.answer("status?").await.unwrap_err();
        assert!(matches!(err, ChatError::Retrieval(_)));
    }
}
