//! Chat handler - natural-language questions over the log history

use axum::{extract::State, Json};

use crate::models::{ChatRequest, ChatResponse};
use crate::{AppError, AppResult, AppState};

pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    if req.question.trim().is_empty() {
        return Err(AppError::ValidationError("No question provided".to_string()));
    }

    tracing::info!(question = %req.question, "chat question received");

    let answer = state.chat.answer(&req.question).await?;
    Ok(Json(ChatResponse { answer }))
}
