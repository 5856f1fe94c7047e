//! Environment configuration.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use raxerp_auth::{MAX_LEEWAY_SECONDS, MAX_TOKEN_TTL_SECONDS};

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{name} must be set: {reason}")]
    Missing {
        name: &'static str,
        reason: &'static str,
    },

    #[error("{missing} must be set together with {present}")]
    Incomplete {
        missing: &'static str,
        present: &'static str,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Credentials for the first administrator, created at startup if absent.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub token_leeway: Duration,
    /// Absent: run on the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// Adds `Secure` to the session cookie.
    pub cookie_secure: bool,
    pub bootstrap_admin: Option<AdminSeed>,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("token_leeway", &self.token_leeway)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("bind_addr", &self.bind_addr)
            .field("cookie_secure", &self.cookie_secure)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset and empty values are
    /// treated alike.
    ///
    /// Without `DATABASE_URL` the process runs in dev mode on the in-memory
    /// store, where a missing `JWT_SECRET` falls back to a fixed dev secret.
    /// With a database configured the secret is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL");

        let jwt_secret = match (get("JWT_SECRET"), &database_url) {
            (Some(secret), _) => secret,
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    name: "JWT_SECRET",
                    reason: "required when DATABASE_URL is set",
                });
            }
            (None, None) => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl_minutes = match get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(raw) => parse_int(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                &raw,
                1,
                MAX_TOKEN_TTL_SECONDS / 60,
            )?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        let token_ttl = Duration::try_minutes(ttl_minutes).ok_or_else(|| {
            ConfigError::invalid("ACCESS_TOKEN_EXPIRE_MINUTES", "out of range")
        })?;

        let leeway_seconds = match get("TOKEN_LEEWAY_SECONDS") {
            Some(raw) => parse_int("TOKEN_LEEWAY_SECONDS", &raw, 0, MAX_LEEWAY_SECONDS)?,
            None => 0,
        };
        let token_leeway = Duration::try_seconds(leeway_seconds)
            .ok_or_else(|| ConfigError::invalid("TOKEN_LEEWAY_SECONDS", "out of range"))?;

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e.to_string()))?;

        let cookie_secure = match get("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => true,
        };

        let bootstrap_admin = match (
            get("BOOTSTRAP_ADMIN_EMAIL"),
            get("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email: email.trim().to_string(),
                password,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    missing: "BOOTSTRAP_ADMIN_PASSWORD",
                    present: "BOOTSTRAP_ADMIN_EMAIL",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    missing: "BOOTSTRAP_ADMIN_EMAIL",
                    present: "BOOTSTRAP_ADMIN_PASSWORD",
                });
            }
        };

        Ok(Self {
            jwt_secret,
            token_ttl,
            token_leeway,
            database_url,
            bind_addr,
            cookie_secure,
            bootstrap_admin,
        })
    }
}

fn parse_int(name: &'static str, raw: &str, min: i64, max: i64) -> Result<i64, ConfigError> {
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::invalid(name, e.to_string()))?;
    if !(min..=max).contains(&value) {
        return Err(ConfigError::invalid(
            name,
            format!("must be between {min} and {max}"),
        ));
    }
    Ok(value)
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(name, format!("expected a boolean, got '{other}'"))),
    }
}
