use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

// Placeholders that keep a local checkout runnable. Rejected outside development.
const DEV_DEFAULT_JWT_SECRET: &str =
    "development_only_jwt_signing_key_replace_me_before_any_shared_deployment_0123456789";
const DEV_DEFAULT_PAYMENT_SECRET_KEY: &str = "sk_test_development_placeholder";
const DEV_DEFAULT_WEBHOOK_SECRET: &str = "whsec_development_placeholder";

const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/payment-success";
const DEFAULT_CANCEL_URL: &str = "http://localhost:3000/payment-cancelled";
const DEFAULT_PAYMENT_API_BASE: &str = "https://api.stripe.com";

/// Application configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    #[validate(length(min = 1))]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Deployment environment ("development", "staging", "production", ...)
    #[validate(length(min = 1))]
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// HS256 key used to validate bearer tokens issued by the identity service
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Payment provider API secret key
    #[validate(length(min = 1))]
    pub payment_secret_key: String,

    /// Shared secret for webhook signature verification
    #[validate(length(min = 1))]
    pub payment_webhook_secret: String,

    /// Redirect after a completed hosted checkout
    #[validate(url)]
    pub payment_success_url: String,

    /// Redirect after an abandoned hosted checkout
    #[validate(url)]
    pub payment_cancel_url: String,

    /// Base URL of the payment provider API
    #[validate(url)]
    pub payment_api_base: String,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub payment_currency: String,

    /// Upper bound for every outbound payment provider call
    #[serde(default = "default_payment_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub payment_timeout_secs: u64,

    /// Maximum accepted age of a signed webhook
    #[serde(default = "default_webhook_tolerance_secs")]
    #[validate(range(min = 1))]
    pub webhook_tolerance_secs: i64,

    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] ConfigError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),
}

impl AppConfig {
    /// Development configuration with all defaults; used by tests and local tooling.
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            jwt_secret: DEV_DEFAULT_JWT_SECRET.to_string(),
            payment_secret_key: DEV_DEFAULT_PAYMENT_SECRET_KEY.to_string(),
            payment_webhook_secret: DEV_DEFAULT_WEBHOOK_SECRET.to_string(),
            payment_success_url: DEFAULT_SUCCESS_URL.to_string(),
            payment_cancel_url: DEFAULT_CANCEL_URL.to_string(),
            payment_api_base: DEFAULT_PAYMENT_API_BASE.to_string(),
            payment_currency: default_currency(),
            payment_timeout_secs: default_payment_timeout_secs(),
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    /// Success redirect with the provider's session placeholder appended.
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}?session_id={{CHECKOUT_SESSION_ID}}",
            self.payment_success_url
        )
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.is_development() {
            let placeholders: [(&'static str, &str, &str); 3] = [
                ("jwt_secret", &self.jwt_secret, DEV_DEFAULT_JWT_SECRET),
                (
                    "payment_secret_key",
                    &self.payment_secret_key,
                    DEV_DEFAULT_PAYMENT_SECRET_KEY,
                ),
                (
                    "payment_webhook_secret",
                    &self.payment_webhook_secret,
                    DEV_DEFAULT_WEBHOOK_SECRET,
                ),
            ];

            for (field, value, placeholder) in placeholders {
                if value.trim() == placeholder {
                    let mut err = ValidationError::new("development_default");
                    err.message = Some(
                        format!(
                            "The development placeholder for {} must not be used outside development. Set APP__{}.",
                            field,
                            field.to_ascii_uppercase()
                        )
                        .into(),
                    );
                    errors.add(field, err);
                }
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_currency() -> String {
    "usd".to_string()
}
fn default_payment_timeout_secs() -> u64 {
    10
}
fn default_webhook_tolerance_secs() -> i64 {
    300
}
fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_settlement={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{RUN_ENV}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

pub(crate) fn load_config_from(dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
        .set_default("payment_secret_key", DEV_DEFAULT_PAYMENT_SECRET_KEY)?
        .set_default("payment_webhook_secret", DEV_DEFAULT_WEBHOOK_SECRET)?
        .set_default("payment_success_url", DEFAULT_SUCCESS_URL)?
        .set_default("payment_cancel_url", DEFAULT_CANCEL_URL)?
        .set_default("payment_api_base", DEFAULT_PAYMENT_API_BASE)?
        .add_source(File::from(dir.join("default")).required(false))
        .add_source(File::from(dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn config_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn development_accepts_placeholders() {
        let config = AppConfig::new("sqlite::memory:", "development");
        assert!(config.validate().is_ok());
        assert!(config.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_rejects_every_placeholder_secret() {
        let config = AppConfig::new("postgres://db/shop", "production");
        let errors = config.validate_additional_constraints().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("jwt_secret"));
        assert!(fields.contains_key("payment_secret_key"));
        assert!(fields.contains_key("payment_webhook_secret"));
    }

    #[test]
    fn production_with_real_secrets_passes() {
        let mut config = AppConfig::new("postgres://db/shop", "production");
        config.jwt_secret = "f3a9c1d7e5b24f68a0c9d3e7b1f5a2c8d6e4f0a9b3c7d1e5".to_string();
        config.payment_secret_key = "sk_live_51Hx".to_string();
        config.payment_webhook_secret = "whsec_9fK2".to_string();

        assert!(config.validate_additional_constraints().is_ok());
    }

    #[test]
    fn checkout_success_url_carries_session_placeholder() {
        let config = AppConfig::new("sqlite::memory:", "development");
        assert_eq!(
            config.checkout_success_url(),
            "http://localhost:3000/payment-success?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn file_layers_override_defaults() {
        let dir = config_dir(&[
            (
                "default.toml",
                "database_url = \"postgres://localhost/shop\"\nport = 9000\n",
            ),
            ("development.toml", "payment_timeout_secs = 4\n"),
        ]);

        let config = load_config_from(dir.path(), "development").unwrap();
        assert_eq!(config.database_url, "postgres://localhost/shop");
        assert_eq!(config.port, 9000);
        assert_eq!(config.payment_timeout_secs, 4);
        assert_eq!(config.payment_currency, "usd");
        assert_eq!(config.webhook_tolerance_secs, 300);
    }

    #[test]
    fn staging_without_secrets_fails_fast() {
        let dir = config_dir(&[]);
        let result = load_config_from(dir.path(), "staging");
        assert_matches!(result, Err(AppConfigError::Validation(_)));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let dir = config_dir(&[("default.toml", "log_level = \"loud\"\n")]);
        let result = load_config_from(dir.path(), "development");
        assert_matches!(result, Err(AppConfigError::Validation(errors)) => {
            assert!(errors.field_errors().contains_key("log_level"));
        });
    }
}
