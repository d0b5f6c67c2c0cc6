use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::{ChatConfig, normalize_host};
use crate::error::AppError;
use crate::upstream::{HttpClient, client};

/// System prompt used when the index has nothing relevant to the question.
pub const FALLBACK_INSTRUCTION: &str = "You are an information extraction and reporting assistant whose task is to read the provided text, identify key data points, and respond with a single clear paragraph. Your goal is to extract core metrics such as maximum or minimum values (for example pressure or temperature), timestamps or dates, and any sensor or device identifiers, and present these elements in a natural, human-readable paragraph. The output must be exactly one paragraph in plain text that states the key metric and its value, states when it occurred if a timestamp or date is available, and states which sensor or identifier it is associated with if available, all within 1–3 concise sentences. Do not use bullet points, numbered lists, code blocks, or headings, do not repeat the user’s question, and do not include any meta-comments or explanatory phrases. Use clear, neutral language as if summarizing a log entry for an engineer or operator, and do not invent or assume any values that are not explicitly present in the input text";

const CONTEXT_HEADER: &str = "Valve status data:\n";

#[derive(Debug, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    #[serde(default)]
    pub endpoint_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    num_results: u32,
    columns: &'a [String],
    query_text: &'a str,
    query_type: &'static str,
    reranker: Reranker<'a>,
}

#[derive(Debug, Serialize)]
struct Reranker<'a> {
    model: &'static str,
    parameters: RerankerParameters<'a>,
}

#[derive(Debug, Serialize)]
struct RerankerParameters<'a> {
    columns_to_rerank: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultSet>,
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultSet {
    #[serde(default)]
    data_array: Option<Vec<Vec<Value>>>,
}

impl SearchResults {
    /// Flattens result rows into `column: value` lines, or `None` when the
    /// search returned no rows.
    pub fn context_block(&self) -> Option<String> {
        let rows = self
            .result
            .as_ref()?
            .data_array
            .as_ref()
            .filter(|rows| !rows.is_empty())?;
        let columns: Vec<&str> = self
            .manifest
            .iter()
            .flat_map(|m| m.columns.iter().map(|c| c.name.as_str()))
            .collect();

        let mut context = String::from(CONTEXT_HEADER);
        for row in rows {
            let line = columns
                .iter()
                .zip(row)
                .map(|(column, value)| format!("{}: {}", column, display_value(value)))
                .collect::<Vec<_>>()
                .join(", ");
            context.push_str(&line);
            context.push('\n');
        }
        Some(context)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct VectorSearchClient<'a> {
    http: &'a HttpClient,
    config: &'a ChatConfig,
    base_url: String,
    token: &'a str,
}

impl<'a> VectorSearchClient<'a> {
    pub fn new(http: &'a HttpClient, config: &'a ChatConfig, workspace_url: &str, token: &'a str) -> Self {
        Self {
            http,
            config,
            base_url: normalize_host(workspace_url),
            token,
        }
    }

    fn index_url(&self) -> String {
        format!(
            "{}/api/2.0/vector-search/indexes/{}",
            self.base_url, self.config.index_name
        )
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Confirms the index exists and is served by the configured endpoint.
    pub async fn lookup_index(&self) -> Result<IndexInfo, AppError> {
        let response = client::get(self.http, &self.index_url(), self.token, self.timeout())
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::IndexLookup(e.to_string()))?;

        let index: IndexInfo = serde_json::from_slice(&response.body)
            .map_err(|e| AppError::IndexLookup(format!("unreadable index description: {}", e)))?;

        match index.endpoint_name.as_deref() {
            Some(endpoint) if endpoint != self.config.vector_endpoint => {
                Err(AppError::IndexLookup(format!(
                    "index {} is served by endpoint {}, expected {}",
                    index.name, endpoint, self.config.vector_endpoint
                )))
            }
            _ => Ok(index),
        }
    }

    /// Hybrid keyword/embedding query, reranked on the configured columns.
    pub async fn similarity_search(&self, query_text: &str) -> Result<SearchResults, AppError> {
        let request = QueryRequest {
            num_results: self.config.num_results,
            columns: &self.config.columns,
            query_text,
            query_type: "HYBRID",
            reranker: Reranker {
                model: "databricks_reranker",
                parameters: RerankerParameters {
                    columns_to_rerank: &self.config.rerank_columns,
                },
            },
        };
        let url = format!("{}/query", self.index_url());

        let response = client::post_json(self.http, &url, self.token, &request, self.timeout())
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AppError::upstream("Vector search failed"))?;

        Ok(serde_json::from_slice(&response.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn results(value: Value) -> SearchResults {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rows_become_context_lines() {
        let search = results(json!({
            "manifest": { "columns": [{ "name": "timestamp" }, { "name": "AssetId" }, { "name": "score" }] },
            "result": {
                "row_count": 2,
                "data_array": [
                    ["2024-05-01T10:00:00", "V-101", 0.91],
                    ["2024-05-01T11:00:00", "V-102", 0.72]
                ]
            }
        }));

        assert_eq!(
            search.context_block().unwrap(),
            "Valve status data:\n\
             timestamp: 2024-05-01T10:00:00, AssetId: V-101, score: 0.91\n\
             timestamp: 2024-05-01T11:00:00, AssetId: V-102, score: 0.72\n"
        );
    }

    #[test]
    fn empty_or_missing_rows_yield_no_context() {
        assert!(results(json!({})).context_block().is_none());
        assert!(
            results(json!({ "manifest": { "columns": [] }, "result": { "row_count": 0 } }))
                .context_block()
                .is_none()
        );
        assert!(
            results(json!({ "result": { "data_array": [] } }))
                .context_block()
                .is_none()
        );
    }
}
