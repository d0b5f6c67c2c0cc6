use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::AppError;

pub async fn get_databricks_data(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    tracing::info!("Databricks HTTP trigger function processed a request.");

    let body = state.warehouse.execute().await?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}
