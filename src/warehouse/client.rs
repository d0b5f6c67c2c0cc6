use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::IgnoredAny;

use crate::config::{WarehouseConfig, normalize_host};
use crate::error::AppError;
use crate::secrets::{DATABRICKS_TOKEN, SecretProvider};
use crate::upstream::{HttpClient, client};

const FETCH_ERROR: &str = "Error fetching Databricks data";

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
}

/// Submits the configured statement to the SQL statement execution API.
#[derive(Clone)]
pub struct WarehouseClient {
    http: HttpClient,
    config: WarehouseConfig,
    secrets: Arc<dyn SecretProvider>,
}

impl WarehouseClient {
    pub fn new(http: HttpClient, config: WarehouseConfig, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            http,
            config,
            secrets,
        }
    }

    /// Returns the upstream JSON body untouched.
    pub async fn execute(&self) -> Result<Bytes, AppError> {
        let (Some(host), Some(token)) = (
            self.config.host.as_deref(),
            self.secrets.secret(DATABRICKS_TOKEN),
        ) else {
            return Err(AppError::NotConfigured(
                "Missing Databricks credentials in environment variables.".to_string(),
            ));
        };

        let url = format!("{}/api/2.0/sql/statements", normalize_host(host));
        let payload = StatementRequest {
            statement: &self.config.statement,
            warehouse_id: &self.config.warehouse_id,
        };
        tracing::info!(
            "Submitting Databricks statement to {} (warehouse {})",
            url,
            self.config.warehouse_id
        );

        let response = client::post_json(&self.http, &url, &token, &payload, self.config.timeout)
            .await
            .map_err(AppError::upstream(FETCH_ERROR))?;

        tracing::info!("Databricks response status: {}", response.status);
        tracing::debug!("Databricks response body: {}", response.text());

        let response = response
            .error_for_status()
            .map_err(AppError::upstream(FETCH_ERROR))?;

        serde_json::from_slice::<IgnoredAny>(&response.body)?;
        Ok(response.body)
    }
}
