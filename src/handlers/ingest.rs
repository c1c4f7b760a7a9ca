//! Log ingestion handler

use axum::{extract::State, Json};

use crate::models::{AnnotatedLog, LogEntry};
use crate::{AppResult, AppState};

/// Ingest one log line. Responds with the merged record that was broadcast
/// to subscribers; persistence continues in the background.
pub async fn ingest(
    State(state): State<AppState>,
    Json(entry): Json<LogEntry>,
) -> AppResult<Json<AnnotatedLog>> {
    let annotated = state.pipeline.ingest(entry).await;
    Ok(Json(annotated))
}
