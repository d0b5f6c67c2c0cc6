use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use thiserror::Error;

pub type HttpClient = Client<hyper_tls::HttpsConnector<HttpConnector>, String>;

pub fn create_client() -> HttpClient {
    let https = hyper_tls::HttpsConnector::new();
    Client::builder(TokioExecutor::new()).build(https)
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Connection(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn error_for_status(self) -> Result<Self, UpstreamError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(UpstreamError::Status {
                status: self.status,
                body: self.text(),
            })
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

pub async fn get(
    client: &HttpClient,
    url: &str,
    token: &str,
    timeout: Duration,
) -> Result<UpstreamResponse, UpstreamError> {
    send(client, Method::GET, url, token, String::new(), timeout).await
}

pub async fn post_json<B: Serialize>(
    client: &HttpClient,
    url: &str,
    token: &str,
    body: &B,
    timeout: Duration,
) -> Result<UpstreamResponse, UpstreamError> {
    let payload = serde_json::to_string(body)?;
    send(client, Method::POST, url, token, payload, timeout).await
}

async fn send(
    client: &HttpClient,
    method: Method,
    url: &str,
    token: &str,
    body: String,
    timeout: Duration,
) -> Result<UpstreamResponse, UpstreamError> {
    let uri: hyper::Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
        UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", token))
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|e| UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let exchange = async {
        let response = client
            .request(req)
            .await
            .map_err(|e| UpstreamError::Connection(error_chain(&e)))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| UpstreamError::Body(error_chain(&e)))?
            .to_bytes();
        Ok(UpstreamResponse { status, body })
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| UpstreamError::Timeout(timeout))?
}

/// Renders an error followed by every `source()` beneath it.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
