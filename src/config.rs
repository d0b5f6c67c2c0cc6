use std::env;
use std::time::Duration;

const DEFAULT_HTTP_PATH: &str = "sql/1.0/warehouses/3dd12f4b21432cb2";
const DEFAULT_QUERY: &str = "SELECT * FROM databricks_dev.default.anamolydetection";
const DEFAULT_INDEX: &str = "databricks_dev.default.anamolydetectionindex";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub warehouse: WarehouseConfig,
    pub events: EventsConfig,
    pub chat: ChatConfig,
    pub smtp: SmtpConfig,
}

#[derive(Clone, Debug)]
pub struct WarehouseConfig {
    pub host: Option<String>,
    pub warehouse_id: String,
    pub statement: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct EventsConfig {
    /// Overrides the `EntityPath` of the connection string.
    pub event_hub_name: Option<String>,
    pub consumer_group: String,
    pub max_events: usize,
    pub listen: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub workspace_url: Option<String>,
    pub vector_endpoint: String,
    pub index_name: String,
    pub num_results: u32,
    pub columns: Vec<String>,
    pub rerank_columns: Vec<String>,
    pub model_endpoint_url: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtpTls {
    /// TLS from the first byte (SMTPS, usually port 465).
    Implicit,
    StartTls,
    None,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    /// Falls back to the `SMTP_USERNAME` secret when unset.
    pub sender: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        // The Functions host tells custom handlers which port to bind
        let port = env::var("FUNCTIONS_CUSTOMHANDLER_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid PORT value: {}", e))?;

        let host = non_empty_var("DATABRICKS_HOST");
        let http_path =
            env::var("DATABRICKS_HTTP_PATH").unwrap_or_else(|_| DEFAULT_HTTP_PATH.to_string());

        let warehouse = WarehouseConfig {
            host: host.clone(),
            warehouse_id: warehouse_id_from_path(&http_path)?,
            statement: env::var("DATABRICKS_QUERY").unwrap_or_else(|_| DEFAULT_QUERY.to_string()),
            timeout: Duration::from_secs(30),
        };

        let events = EventsConfig {
            event_hub_name: non_empty_var("EH_NAME"),
            consumer_group: env::var("EH_CONSUMER_GROUP").unwrap_or_else(|_| "$Default".to_string()),
            max_events: parse_var("EH_MAX_EVENTS", 50)?,
            listen: Duration::from_secs(parse_var("EH_LISTEN_SECONDS", 5)?),
            shutdown_grace: Duration::from_secs(2),
        };

        let chat = ChatConfig {
            workspace_url: non_empty_var("WORKSPACE_URL").or(host),
            vector_endpoint: env::var("VECTOR_SEARCH_ENDPOINT")
                .unwrap_or_else(|_| "vectordb".to_string()),
            index_name: env::var("VECTOR_SEARCH_INDEX").unwrap_or_else(|_| DEFAULT_INDEX.to_string()),
            num_results: 3,
            columns: vec!["timestamp".to_string(), "AssetId".to_string()],
            rerank_columns: vec!["timestamp".to_string()],
            model_endpoint_url: non_empty_var("MODEL_ENDPOINT_URL")
                .or_else(|| non_empty_var("endpoint_url")),
            max_tokens: parse_var("CHAT_MAX_TOKENS", 5000)?,
            timeout: Duration::from_secs(parse_var("UPSTREAM_TIMEOUT_SECONDS", 30)?),
        };

        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            port: parse_var("SMTP_PORT", 465)?,
            tls: parse_tls(&env::var("SMTP_TLS").unwrap_or_else(|_| "implicit".to_string()))?,
            sender: non_empty_var("SMTP_SENDER"),
        };

        Ok(Config {
            port,
            warehouse,
            events,
            chat,
            smtp,
        })
    }
}

/// Prefixes `https://` when the host carries no scheme and drops trailing slashes.
pub fn normalize_host(raw: &str) -> String {
    let host = raw.trim().trim_end_matches('/');
    if host.starts_with("http") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn warehouse_id_from_path(http_path: &str) -> anyhow::Result<String> {
    http_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid DATABRICKS_HTTP_PATH value: {}", http_path))
}

fn parse_tls(value: &str) -> anyhow::Result<SmtpTls> {
    match value.to_ascii_lowercase().as_str() {
        "implicit" | "ssl" | "tls" => Ok(SmtpTls::Implicit),
        "starttls" => Ok(SmtpTls::StartTls),
        "none" | "plain" => Ok(SmtpTls::None),
        other => Err(anyhow::anyhow!("Invalid SMTP_TLS value: {}", other)),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} value: {}", key, e)),
        None => Ok(default),
    }
}
