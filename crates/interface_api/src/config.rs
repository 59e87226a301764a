//! API configuration

use config::{Config, ConfigError, Environment, Source};
use serde::Deserialize;

use domain_billing::{InvoicePrefix, NumberingError, DEFAULT_INVOICE_PREFIX};

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

/// Where invoices are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local store, lost on restart
    Memory,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    /// Two-letter code invoice numbers start with
    pub invoice_prefix: String,
    /// Whether "invoice created" events are handed to the notifier
    pub enable_notifications: bool,
    pub storage: StorageBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/invoice_ledger".to_string(),
            max_connections: 10,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            invoice_prefix: DEFAULT_INVOICE_PREFIX.to_string(),
            enable_notifications: true,
            storage: StorageBackend::Postgres,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix("API").try_parsing(true))
    }

    fn load<S>(source: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let defaults = Self::default();
        Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "plain")?
            .set_default("invoice_prefix", defaults.invoice_prefix)?
            .set_default("enable_notifications", defaults.enable_notifications)?
            .set_default("storage", "postgres")?
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses the configured invoice prefix
    pub fn invoice_prefix(&self) -> Result<InvoicePrefix, NumberingError> {
        InvoicePrefix::new(self.invoice_prefix.as_str())
    }
}
