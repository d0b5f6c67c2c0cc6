use std::sync::Arc;

use super::model::{ChatReply, ModelClient};
use super::vector::{FALLBACK_INSTRUCTION, VectorSearchClient};
use crate::config::ChatConfig;
use crate::error::AppError;
use crate::secrets::{DATABRICKS_TOKEN, SecretProvider};
use crate::upstream::HttpClient;

/// Retrieval-augmented answer: vector search for context, then one completion.
#[derive(Clone)]
pub struct ChatService {
    http: HttpClient,
    config: ChatConfig,
    secrets: Arc<dyn SecretProvider>,
}

impl ChatService {
    pub fn new(http: HttpClient, config: ChatConfig, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            http,
            config,
            secrets,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<ChatReply, AppError> {
        let token = self.secrets.secret(DATABRICKS_TOKEN).ok_or_else(|| {
            AppError::NotConfigured("Missing Databricks credentials in environment variables.".to_string())
        })?;
        let workspace_url = self.config.workspace_url.as_deref().ok_or_else(|| {
            AppError::NotConfigured("WORKSPACE_URL not configured in environment.".to_string())
        })?;
        let endpoint_url = self.config.model_endpoint_url.as_deref().ok_or_else(|| {
            AppError::NotConfigured("Model endpoint URL not configured in environment.".to_string())
        })?;

        let search = VectorSearchClient::new(&self.http, &self.config, workspace_url, &token);
        let index = search.lookup_index().await?;
        tracing::debug!("Resolved vector index {}", index.name);

        let results = search.similarity_search(prompt).await?;
        let context = match results.context_block() {
            Some(context) => context,
            None => {
                tracing::info!("No relevant context found from vector search.");
                FALLBACK_INSTRUCTION.to_string()
            }
        };

        ModelClient::new(
            &self.http,
            endpoint_url,
            &token,
            self.config.max_tokens,
            self.config.timeout,
        )
        .complete(&context, prompt)
        .await
    }
}
