mod app;
mod chat;
mod config;
mod email;
mod error;
mod events;
mod secrets;
mod upstream;
mod warehouse;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::email::{Mailer, SmtpMailer};
use crate::events::{EventSource, KafkaEventSource};
use crate::secrets::{EVENT_HUB_CONNECTION, EnvSecrets, SecretProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adx_functions=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    let secrets: Arc<dyn SecretProvider> = Arc::new(EnvSecrets);
    tracing::info!(
        "Starting ADX functions on port {} (warehouse {})",
        config.port,
        config.warehouse.warehouse_id
    );

    let events: Option<Arc<dyn EventSource>> = match secrets.secret(EVENT_HUB_CONNECTION) {
        Some(conn) => {
            let source = KafkaEventSource::from_connection_string(&conn, &config.events)?;
            tracing::info!("Event hub pulls read from {}", source.topic());
            Some(Arc::new(source))
        }
        None => {
            tracing::warn!("EH_CONN_STR not set, /GetADXData will return 500");
            None
        }
    };

    let mailer: Option<Arc<dyn Mailer>> = match SmtpMailer::new(&config.smtp, secrets.as_ref()) {
        Ok(mailer) => {
            tracing::info!("Email relay via {}:{}", config.smtp.host, config.smtp.port);
            Some(Arc::new(mailer))
        }
        Err(e) => {
            tracing::warn!("Email disabled: {}", e);
            None
        }
    };

    // Create HTTP client
    let http = upstream::create_client();

    // Create shared state
    let state = Arc::new(app::AppState {
        warehouse: warehouse::WarehouseClient::new(
            http.clone(),
            config.warehouse.clone(),
            secrets.clone(),
        ),
        events,
        window: (&config.events).into(),
        chat: chat::ChatService::new(http, config.chat.clone(), secrets),
        mailer,
    });

    let app = app::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
