use std::env;

pub const DATABRICKS_TOKEN: &str = "DATABRICKS_TOKEN";
pub const EVENT_HUB_CONNECTION: &str = "EH_CONN_STR";
pub const SMTP_USERNAME: &str = "SMTP_USERNAME";
pub const SMTP_PASSWORD: &str = "SMTP_PASSWORD";

/// Source of credentials, looked up by name.
///
/// The Databricks token is read on every request. The SMTP login and the
/// Event Hubs connection string are read once at startup, when the mailer and
/// the event source are built.
pub trait SecretProvider: Send + Sync {
    fn secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment (app settings / Key Vault references).
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
pub use fixed::FixedSecrets;
