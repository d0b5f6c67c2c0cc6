use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;

use crate::chat::{self, ChatService};
use crate::email::{self, Mailer};
use crate::events::{self, CollectWindow, EventSource};
use crate::warehouse::{self, WarehouseClient};

#[derive(Clone)]
pub struct AppState {
    pub warehouse: WarehouseClient,
    /// `None` when `EH_CONN_STR` is absent.
    pub events: Option<Arc<dyn EventSource>>,
    pub window: CollectWindow,
    pub chat: ChatService,
    pub mailer: Option<Arc<dyn Mailer>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let functions = Router::new()
        .route(
            "/GetDatabricksData",
            get(warehouse::get_databricks_data).post(warehouse::get_databricks_data),
        )
        .route(
            "/GetADXData",
            get(events::get_adx_data).post(events::get_adx_data),
        )
        .route("/ChatbotADXFunction", post(chat::chat_handler))
        .route("/send-email", post(email::send_email));

    Router::new()
        .route("/health", get(health_check))
        .merge(functions.clone())
        // The Functions host forwards requests with their /api prefix intact
        .nest("/api", functions)
        .with_state(state)
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "adx_functions"
    }))
}
