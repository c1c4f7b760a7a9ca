//! Anomaly classifier - wraps the generative model behind a cache.
//!
//! `classify` never fails outward: any model or parse failure degrades to
//! the fixed fallback verdict so ingestion cannot stall on a flaky model.
//! Failures are not cached, so an identical later log gets a fresh attempt.

use std::sync::Arc;

use serde::Deserialize;

use super::cache::VerdictCache;
use super::gemini::TextModel;
use crate::models::{LogEntry, Verdict};

pub struct Classifier {
    model: Arc<dyn TextModel>,
    cache: VerdictCache,
}

/// Raw model output before range validation.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    is_anomaly: bool,
    risk_score: i64,
    attack_type: String,
    analysis: String,
}

impl Classifier {
    pub fn new(model: Arc<dyn TextModel>, cache_capacity: usize) -> Self {
        Self {
            model,
            cache: VerdictCache::new(cache_capacity),
        }
    }

    /// Classify one log entry. A cache hit short-circuits the model call.
    pub async fn classify(&self, entry: &LogEntry) -> Verdict {
        let key = entry.cache_key();

        if let Some(cached) = self.cache.lookup(&key) {
            tracing::debug!(service = entry.service_name(), "verdict cache hit");
            return cached;
        }

        let prompt = build_prompt(entry);

        match self.model.generate_json(&prompt).await {
            Ok(text) => match parse_verdict(&text) {
                Ok(verdict) => {
                    self.cache.store(&key, verdict.clone());
                    verdict
                }
                Err(err) => {
                    tracing::warn!(
                        service = entry.service_name(),
                        %err,
                        "unparseable classifier output, using fallback verdict"
                    );
                    Verdict::fallback()
                }
            },
            Err(err) => {
                tracing::warn!(
                    service = entry.service_name(),
                    %err,
                    "classification call failed, using fallback verdict"
                );
                Verdict::fallback()
            }
        }
    }

    #[cfg(test)]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn build_prompt(entry: &LogEntry) -> String {
    format!(
        "Role: Cybersecurity Expert. Context: Service \"{}\". Log: \"{}\".\n\
         Task: Analyze for anomalies. Output JSON: \
         {{ \"is_anomaly\": boolean, \"risk_score\": number, \"attack_type\": string, \"analysis\": string }}",
        entry.service_name(),
        entry.message
    )
}

fn parse_verdict(text: &str) -> Result<Verdict, serde_json::Error> {
    let raw: RawVerdict = serde_json::from_str(text.trim())?;
    Ok(Verdict {
        is_anomaly: raw.is_anomaly,
        risk_score: raw.risk_score.clamp(0, 100) as u8,
        attack_type: raw.attack_type,
        analysis: raw.analysis,
    })
}
