use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-only-insecure-secret";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} is required unless DEV_MODE is enabled")]
    Missing(&'static str),
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub dev_mode: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub session_lifetime_hours: i64,
    pub short_link_base_url: String,
    pub media_root: String,
}

impl Config {
    /// Fails when `JWT_SECRET` is unset outside dev mode.
    pub fn load() -> Result<Self, ConfigError> {
        let dev_mode = try_load("DEV_MODE", false);

        Ok(Self {
            dev_mode,
            database_url: try_load("DATABASE_URL", String::from("postgres://localhost/foodgram")),
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", 5),
            jwt_secret: jwt_secret(env::var("JWT_SECRET").ok(), dev_mode)?,
            session_lifetime_hours: try_load("SESSION_LIFETIME_HOURS", 1),
            short_link_base_url: try_load("SHORT_LINK_BASE_URL", String::from("http://localhost/s/")),
            media_root: try_load("MEDIA_ROOT", String::from("media")),
        })
    }
}

/// Sessions are only ever signed with a well-known key in dev mode.
fn jwt_secret(value: Option<String>, dev_mode: bool) -> Result<String, ConfigError> {
    match value.filter(|secret| !secret.is_empty()) {
        Some(secret) => Ok(secret),
        None if dev_mode => {
            log::warn!("JWT_SECRET not set, using the insecure dev-mode secret");
            Ok(String::from(DEV_JWT_SECRET))
        }
        None => Err(ConfigError::Missing("JWT_SECRET")),
    }
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => parse_or_default(key, &value, default),
        Err(_) => {
            log::warn!("{key} not set, using default: {default}");
            default
        }
    }
}

fn parse_or_default<T: FromStr + Display>(key: &str, value: &str, default: T) -> T
where
    T::Err: Display,
{
    value.parse().unwrap_or_else(|e| {
        log::warn!("Invalid {key} value ({e}), using default: {default}");
        default
    })
}
