// Configuration de l'application, lue depuis l'environnement (.env via dotenv)

use chrono::Duration;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Mode global du process, utilisé par le rendu des erreurs
static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

pub fn set_environment(environment: Environment) {
    if ENVIRONMENT.set(environment).is_err() {
        warn!("Environment already initialised, ignoring {:?}", environment);
    }
}

/// Development tant que `set_environment` n'a pas été appelé
pub fn environment() -> Environment {
    ENVIRONMENT.get().copied().unwrap_or(Environment::Development)
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub from: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sendgrid_username: Option<String>,
    pub sendgrid_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_cookie_expires_in_days: i64,
    pub email: EmailConfig,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub templates_dir: String,
    pub public_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match optional("APP_ENV").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            environment,
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expires_in: match optional("JWT_EXPIRES_IN") {
                Some(raw) => parse_duration(&raw).map_err(|_| ConfigError::Invalid {
                    key: "JWT_EXPIRES_IN",
                    value: raw,
                })?,
                None => Duration::days(90),
            },
            jwt_cookie_expires_in_days: parse_or("JWT_COOKIE_EXPIRES_IN", 90)?,
            email: EmailConfig {
                from: optional("EMAIL_FROM").unwrap_or_else(|| "hello@natours.io".to_string()),
                host: optional("EMAIL_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or("EMAIL_PORT", 2525)?,
                username: optional("EMAIL_USERNAME").unwrap_or_default(),
                password: optional("EMAIL_PASSWORD").unwrap_or_default(),
                sendgrid_username: optional("SENDGRID_USERNAME"),
                sendgrid_password: optional("SENDGRID_PASSWORD"),
            },
            stripe_secret_key: optional("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            templates_dir: optional("TEMPLATES_DIR").unwrap_or_else(|| "templates".to_string()),
            public_dir: optional("PUBLIC_DIR").unwrap_or_else(|| "public".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}

/// Parse une durée au format "90d", "12h", "30m" ou "45s" (un nombre seul = secondes)
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::Invalid {
        key: "duration",
        value: raw.to_string(),
    };

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    match unit {
        "d" => Ok(Duration::days(amount)),
        "h" => Ok(Duration::hours(amount)),
        "m" => Ok(Duration::minutes(amount)),
        "s" | "" => Ok(Duration::seconds(amount)),
        _ => Err(invalid()),
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
