//! Process configuration, read once at startup.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use be_auth_core::JwtConfig;
use be_auth_service::AuthConfig;
use be_charge_service::ChargePolicy;
use chrono::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub http_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub charge_policy: ChargePolicy,
    pub auth: AuthConfig,
    pub cors_origins: CorsOrigins,
}

impl ServerConfig {
    pub const DEFAULT_HTTP_ADDR: &'static str = "0.0.0.0:3000";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which returns the raw value
    /// of a variable. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let jwt_refresh_secret =
            get("JWT_REFRESH_SECRET").unwrap_or_else(|| format!("{jwt_secret}:refresh"));

        let http_addr = parse(
            "HTTP_ADDR",
            get("HTTP_ADDR").unwrap_or_else(|| Self::DEFAULT_HTTP_ADDR.to_string()),
        )?;

        let access_minutes = match get("JWT_ACCESS_TTL_MINUTES") {
            Some(v) => positive("JWT_ACCESS_TTL_MINUTES", v)?,
            None => JwtConfig::DEFAULT_ACCESS_EXPIRY_MINUTES,
        };
        let refresh_days = match get("JWT_REFRESH_TTL_DAYS") {
            Some(v) => positive("JWT_REFRESH_TTL_DAYS", v)?,
            None => JwtConfig::DEFAULT_REFRESH_EXPIRY_DAYS,
        };

        let charge_policy = match get("CHARGE_POLICY") {
            Some(v) => parse("CHARGE_POLICY", v)?,
            None => ChargePolicy::default(),
        };

        let allow_admin_registration = match get("ALLOW_ADMIN_REGISTRATION") {
            Some(v) => flag("ALLOW_ADMIN_REGISTRATION", v)?,
            None => false,
        };

        let cors_origins = match get("CORS_ALLOWED_ORIGINS") {
            None => CorsOrigins::Any,
            Some(v) if v.trim() == "*" => CorsOrigins::Any,
            Some(v) => CorsOrigins::List(
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<HeaderValue>().map_err(|_| ConfigError::Invalid {
                            name: "CORS_ALLOWED_ORIGINS",
                            value: s.to_string(),
                        })
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            http_addr,
            jwt_secret,
            jwt_refresh_secret,
            access_ttl: Duration::minutes(access_minutes),
            refresh_ttl: Duration::days(refresh_days),
            charge_policy,
            auth: AuthConfig {
                allow_admin_registration,
            },
            cors_origins,
        })
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::from_secrets(
            self.jwt_secret.as_bytes(),
            self.jwt_refresh_secret.as_bytes(),
        )
        .with_expiry(self.access_ttl, self.refresh_ttl)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn positive(name: &'static str, value: String) -> Result<i64, ConfigError> {
    match value.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

fn flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
