//! Shared fixtures for handler tests: state builders, stub upstream servers
//! and a one-shot request helper.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use crate::app::{AppState, router};
use crate::chat::ChatService;
use crate::config::{ChatConfig, WarehouseConfig};
use crate::email::Mailer;
use crate::events::{CollectWindow, EventSource};
use crate::secrets::FixedSecrets;
use crate::upstream::create_client;
use crate::warehouse::WarehouseClient;

pub struct TestState {
    warehouse: WarehouseConfig,
    chat: ChatConfig,
    secrets: FixedSecrets,
    events: Option<Arc<dyn EventSource>>,
    window: CollectWindow,
    mailer: Option<Arc<dyn Mailer>>,
}

impl TestState {
    pub fn new() -> Self {
        Self {
            warehouse: WarehouseConfig {
                host: None,
                warehouse_id: "3dd12f4b21432cb2".into(),
                statement: "SELECT * FROM databricks_dev.default.anamolydetection".into(),
                timeout: Duration::from_secs(5),
            },
            chat: ChatConfig {
                workspace_url: None,
                vector_endpoint: "vectordb".into(),
                index_name: "databricks_dev.default.anamolydetectionindex".into(),
                num_results: 3,
                columns: vec!["timestamp".into(), "AssetId".into()],
                rerank_columns: vec!["timestamp".into()],
                model_endpoint_url: None,
                max_tokens: 5000,
                timeout: Duration::from_secs(5),
            },
            secrets: FixedSecrets::default(),
            events: None,
            window: CollectWindow {
                max_events: 50,
                listen: Duration::from_secs(5),
                shutdown_grace: Duration::from_secs(2),
            },
            mailer: None,
        }
    }

    pub fn with_warehouse_host(mut self, host: &str) -> Self {
        self.warehouse.host = Some(host.to_string());
        self
    }

    pub fn with_chat_endpoints(mut self, workspace_url: &str, model_endpoint_url: &str) -> Self {
        self.chat.workspace_url = Some(workspace_url.to_string());
        self.chat.model_endpoint_url = Some(model_endpoint_url.to_string());
        self
    }

    pub fn with_secrets(mut self, secrets: FixedSecrets) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_events(mut self, source: Arc<dyn EventSource>, window: CollectWindow) -> Self {
        self.events = Some(source);
        self.window = window;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn router(self) -> Router {
        let http = create_client();
        let secrets = Arc::new(self.secrets);
        router(Arc::new(AppState {
            warehouse: WarehouseClient::new(http.clone(), self.warehouse, secrets.clone()),
            events: self.events,
            window: self.window,
            chat: ChatService::new(http, self.chat, secrets),
            mailer: self.mailer,
        }))
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[derive(Debug, Default)]
pub struct ReceivedMail {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
    pub data: String,
}

/// Minimal plaintext SMTP server accepting a single session.
pub async fn spawn_smtp_stub() -> (u16, JoinHandle<Vec<ReceivedMail>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = socket.into_split();
        let mut lines = BufReader::new(reader).lines();
        let mut received = Vec::new();
        let mut current = ReceivedMail::default();

        writer.write_all(b"220 stub ESMTP ready\r\n").await.unwrap();
        while let Some(line) = lines.next_line().await.unwrap() {
            let command = line.to_ascii_uppercase();
            let reply: &[u8] = if command.starts_with("EHLO") || command.starts_with("HELO") {
                b"250 stub\r\n"
            } else if command.starts_with("MAIL FROM:") {
                current.mail_from = line["MAIL FROM:".len()..].trim().to_string();
                b"250 OK\r\n"
            } else if command.starts_with("RCPT TO:") {
                current.rcpt_to.push(line["RCPT TO:".len()..].trim().to_string());
                b"250 OK\r\n"
            } else if command == "DATA" {
                writer.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.unwrap();
                while let Some(data_line) = lines.next_line().await.unwrap() {
                    if data_line == "." {
                        break;
                    }
                    current.data.push_str(&data_line);
                    current.data.push('\n');
                }
                received.push(std::mem::take(&mut current));
                b"250 queued\r\n"
            } else if command.starts_with("RSET") || command.starts_with("NOOP") {
                b"250 OK\r\n"
            } else if command.starts_with("QUIT") {
                writer.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                b"502 command not implemented\r\n"
            };
            writer.write_all(reply).await.unwrap();
        }
        received
    });

    (port, handle)
}
