//! Log domain types: inbound entries, AI verdicts, and the merged record
//! that gets broadcast and persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity reported by the producing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Critical,
}

/// One raw log line as submitted by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Missing or empty service names collapse to "unknown" at the boundary.
    #[serde(default)]
    pub service_name: Option<String>,
    /// Producer-side timestamp, passed through untouched when present.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl LogEntry {
    /// Service name with the boundary default applied.
    pub fn service_name(&self) -> &str {
        match self.service_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "unknown",
        }
    }

    /// Normalized signature used as the verdict cache key.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.service_name(), self.message)
            .trim()
            .to_lowercase()
    }
}

/// Structured anomaly verdict for one log entry. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_anomaly: bool,
    /// Risk in [0, 100]; parse clamps model output into range.
    pub risk_score: u8,
    pub attack_type: String,
    pub analysis: String,
}

impl Verdict {
    /// Safe verdict used whenever the model call or its output parse fails.
    pub fn fallback() -> Self {
        Self {
            is_anomaly: false,
            risk_score: 0,
            attack_type: "Unknown".to_string(),
            analysis: "AI Fallback".to_string(),
        }
    }
}

/// A log entry merged with its verdict; the unit of broadcast and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedLog {
    pub level: LogLevel,
    pub message: String,
    pub service_name: String,
    /// Producer-side timestamp, forwarded to subscribers as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub is_anomaly: bool,
    pub risk_score: u8,
    pub attack_type: String,
    pub analysis: String,
    pub created_at: DateTime<Utc>,
}

impl AnnotatedLog {
    /// Typed merge of a validated entry and its verdict.
    pub fn merge(entry: &LogEntry, verdict: Verdict) -> Self {
        Self {
            level: entry.level,
            message: entry.message.clone(),
            service_name: entry.service_name().to_string(),
            timestamp: entry.timestamp.clone(),
            is_anomaly: verdict.is_anomaly,
            risk_score: verdict.risk_score,
            attack_type: verdict.attack_type,
            analysis: verdict.analysis,
            created_at: Utc::now(),
        }
    }

    /// Text handed to the embedding model, mixing the raw message with the
    /// analysis so retrieval picks up on attack semantics as well.
    pub fn embedding_input(&self) -> String {
        format!(
            "Service: {}. Message: {}. Analysis: {}. Type: {}",
            self.service_name, self.message, self.analysis, self.attack_type
        )
    }
}

/// Record shape at the store boundary (insert and query results).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub level: LogLevel,
    pub message: String,
    pub is_anomaly: bool,
    pub analysis: String,
    pub service_name: String,
    pub risk_score: u8,
    pub attack_type: String,
    pub created_at: DateTime<Utc>,
    /// Null when embedding generation failed; the log is stored regardless.
    pub embedding: Option<Vec<f32>>,
}

impl StoredLog {
    pub fn from_annotated(log: &AnnotatedLog, embedding: Option<Vec<f32>>) -> Self {
        Self {
            id: None,
            level: log.level,
            message: log.message.clone(),
            is_anomaly: log.is_anomaly,
            analysis: log.analysis.clone(),
            service_name: log.service_name.clone(),
            risk_score: log.risk_score,
            attack_type: log.attack_type.clone(),
            created_at: log.created_at,
            embedding,
        }
    }
}
