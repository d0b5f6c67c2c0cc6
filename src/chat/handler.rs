use axum::{Json, extract::State};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    prompt: Option<String>,
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    tracing::info!("Chatbot request received.");

    let prompt =
        extract_prompt(&body).ok_or_else(|| AppError::BadRequest("No prompt provided.".to_string()))?;

    let reply = state.chat.generate(&prompt).await?;
    Ok(Json(reply.into_json()))
}

fn extract_prompt(body: &[u8]) -> Option<String> {
    let request: ChatRequest = serde_json::from_slice(body).ok()?;
    request.prompt.filter(|p| !p.trim().is_empty())
}
