use axum::{Json, extract::State, http::StatusCode};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::OutgoingEmail;
use crate::app::AppState;

#[derive(Debug, Default, Deserialize)]
struct EmailFields {
    to: Option<String>,
    subject: Option<String>,
    body: Option<String>,
}

impl EmailFields {
    /// JSON first; anything that is not a JSON object with fields is read as a form.
    fn parse(raw: &[u8]) -> Self {
        match serde_json::from_slice::<EmailFields>(raw) {
            Ok(fields) if !fields.is_empty() => fields,
            _ => serde_urlencoded::from_bytes(raw).unwrap_or_default(),
        }
    }

    fn is_empty(&self) -> bool {
        self.to.is_none() && self.subject.is_none() && self.body.is_none()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn failure(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": error.into() })),
    )
}

pub async fn send_email(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, Json<Value>) {
    tracing::info!("Processing email request...");

    let fields = EmailFields::parse(&body);
    let (Some(to), Some(subject), Some(text)) = (
        present(fields.to),
        present(fields.subject),
        present(fields.body),
    ) else {
        return failure(StatusCode::BAD_REQUEST, "Missing fields (to, subject, body)");
    };

    let email = match OutgoingEmail::new(&to, subject, text) {
        Ok(email) => email,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let Some(mailer) = state.mailer.as_ref() else {
        tracing::error!("Email send requested but no mailer is configured");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Email delivery is not configured.",
        );
    };

    match mailer.send(&email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Email sent successfully" })),
        ),
        Err(e) => {
            tracing::error!("Email send error: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
