use chrono::Duration;

use crate::error::ConfigError;

const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;
const MAX_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const MAX_REFRESH_TOKEN_TTL_HOURS: i64 = 10 * 365 * 24;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    pub webhooks: WebhookSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server-level connection, for creating throwaway test databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing and session lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_hours: i64,
    pub password_hash_cost: u32,
    pub store_timeout_ms: u64,
    #[serde(default)]
    pub revoke_sessions_on_credential_change: bool,
    /// 0 disables the background sweep
    #[serde(default)]
    pub expired_token_sweep_interval_secs: u64,
}

impl AuthSettings {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl_seconds)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::hours(self.refresh_token_ttl_hours)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

// The secret must never reach a log line through `{:?}`.
impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[redacted]")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_hours", &self.refresh_token_ttl_hours)
            .field("password_hash_cost", &self.password_hash_cost)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field(
                "revoke_sessions_on_credential_change",
                &self.revoke_sessions_on_credential_change,
            )
            .field(
                "expired_token_sweep_interval_secs",
                &self.expired_token_sweep_interval_secs,
            )
            .finish()
    }
}

/// Billing provider webhook settings
#[derive(serde::Deserialize, Clone)]
pub struct WebhookSettings {
    pub polka_api_key: String,
}

impl std::fmt::Debug for WebhookSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSettings")
            .field("polka_api_key", &"[redacted]")
            .finish()
    }
}

impl Settings {
    /// Reject settings the service cannot run safely with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.webhooks.polka_api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "webhooks.polka_api_key".to_string(),
            ));
        }
        if !(1..=MAX_ACCESS_TOKEN_TTL_SECONDS).contains(&self.auth.access_token_ttl_seconds) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.access_token_ttl_seconds must be between 1 and {}",
                MAX_ACCESS_TOKEN_TTL_SECONDS
            )));
        }
        if !(1..=MAX_REFRESH_TOKEN_TTL_HOURS).contains(&self.auth.refresh_token_ttl_hours) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.refresh_token_ttl_hours must be between 1 and {}",
                MAX_REFRESH_TOKEN_TTL_HOURS
            )));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.auth.password_hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.password_hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        if self.auth.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.store_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from `configuration.yaml` (optional) overlaid with
/// `APP_`-prefixed environment variables, e.g. `APP_AUTH__JWT_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
