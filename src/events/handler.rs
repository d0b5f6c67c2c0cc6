use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{EventRecord, collect};
use crate::app::AppState;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct EventBatch {
    pub events: Vec<EventRecord>,
}

pub async fn get_adx_data(State(state): State<Arc<AppState>>) -> Result<Json<EventBatch>, AppError> {
    tracing::info!("ADX HTTP pull trigger processed a request.");

    let Some(source) = state.events.clone() else {
        return Err(AppError::NotConfigured(
            "EH_CONN_STR not configured in environment.".to_string(),
        ));
    };

    let events = collect(source, state.window).await;
    tracing::info!("Collected {} events", events.len());

    Ok(Json(EventBatch { events }))
}
