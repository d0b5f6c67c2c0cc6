use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::AppError;
use crate::upstream::{HttpClient, client};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

/// What the serving endpoint answered with.
#[derive(Debug, PartialEq)]
pub enum ChatReply {
    Json(Value),
    /// The endpoint answered 2xx with a body that is not JSON.
    Text(String),
}

impl ChatReply {
    pub fn into_json(self) -> Value {
        match self {
            ChatReply::Json(value) => value,
            ChatReply::Text(text) => json!({ "reply": text }),
        }
    }
}

pub struct ModelClient<'a> {
    http: &'a HttpClient,
    endpoint_url: &'a str,
    token: &'a str,
    max_tokens: u32,
    timeout: Duration,
}

impl<'a> ModelClient<'a> {
    pub fn new(
        http: &'a HttpClient,
        endpoint_url: &'a str,
        token: &'a str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint_url,
            token,
            max_tokens,
            timeout,
        }
    }

    pub async fn complete(&self, context: &str, prompt: &str) -> Result<ChatReply, AppError> {
        let request = CompletionRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: context,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = client::post_json(self.http, self.endpoint_url, self.token, &request, self.timeout)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AppError::upstream("Chat completion failed"))?;

        match serde_json::from_slice::<Value>(&response.body) {
            Ok(value) => Ok(ChatReply::Json(value)),
            Err(e) => {
                tracing::warn!("Model endpoint returned non-JSON body: {}", e);
                Ok(ChatReply::Text(response.text()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_reply_is_wrapped() {
        assert_eq!(
            ChatReply::Text("Valve V-101 peaked at 80 psi.".into()).into_json(),
            json!({ "reply": "Valve V-101 peaked at 80 psi." })
        );
    }

    #[test]
    fn request_carries_system_and_user_turns() {
        let request = CompletionRequest {
            messages: [
                ChatMessage { role: "system", content: "ctx" },
                ChatMessage { role: "user", content: "max pressure?" },
            ],
            max_tokens: 5000,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "messages": [
                    { "role": "system", "content": "ctx" },
                    { "role": "user", "content": "max pressure?" }
                ],
                "max_tokens": 5000
            })
        );
    }
}
