use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
    /// Upper bound on each storage operation.
    pub timeout_secs: u64,
}

impl MongoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes)
    }
}

impl AccountConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let timeout_secs: u64 = parse_env("MONGODB_TIMEOUT_SECS", Some("10"), is_prod)?;
        if timeout_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MONGODB_TIMEOUT_SECS must be positive"
            )));
        }

        let secret = get_env("JWT_SECRET", None, is_prod)?;
        if secret.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        let ttl_minutes: i64 = parse_env("JWT_TTL_MINUTES", Some("1440"), is_prod)?;
        if ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_TTL_MINUTES must be positive"
            )));
        }

        Ok(AccountConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: Secret::new(get_env("MONGODB_URI", None, is_prod)?),
                database: get_env("MONGODB_DATABASE", Some("account_db"), is_prod)?,
                timeout_secs,
            },
            jwt: JwtConfig {
                secret: Secret::new(secret),
                ttl_minutes,
            },
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
        })
    }

    pub fn mongodb_uri(&self) -> &str {
        self.mongodb.uri.expose_secret()
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}
