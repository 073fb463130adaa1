use std::{net::SocketAddr, str::FromStr, time::Duration};

#[derive(Clone, Debug, PartialEq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub database_max_connections: usize,
    pub database_acquire_timeout: Duration,
    pub cors_allowed_origin: Option<String>,
}

impl Env {
    /// Reads `ENVIRONMENT`, defaulting to [`Env::Dev`]
    pub fn from_env() -> Self {
        parse_env(optional_var("ENVIRONMENT").as_deref())
    }
}

const DEFAULT_MAX_CONNECTIONS: usize = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => Ok(None),
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

fn required_var(key: &str) -> String {
    let val = var(key);
    match val {
        Ok(val) => match val {
            Some(val) => val,
            None => {
                tracing::error!("Environment variable `{key}` is required");
                std::process::exit(1)
            }
        },
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

/// Parses an optional raw value, falling back to `default` when it is absent
/// or malformed.
fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value `{raw}` for `{key}`, using the default");
            default
        }),
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn parse_env(raw: Option<&str>) -> Env {
    match raw {
        Some("dev") => Env::Dev,
        Some("staging") => Env::Staging,
        Some("production") => Env::Production,
        _ => Env::Dev,
    }
}

fn optional_var(key: &str) -> Option<String> {
    var(key)
        .inspect_err(|e| tracing::warn!("{e}"))
        .ok()
        .flatten()
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let listen_addr = parse_or(
            "LISTEN_ADDR",
            optional_var("LISTEN_ADDR"),
            default_listen_addr(),
        );

        ServerConfig {
            database_url: required_var("DATABASE_URL"),
            listen_addr,
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                optional_var("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            ),
            database_acquire_timeout: Duration::from_secs(parse_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                optional_var("DATABASE_ACQUIRE_TIMEOUT_SECS"),
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )),
            cors_allowed_origin: optional_var("CORS_ALLOWED_ORIGIN"),
        }
    }

    /// Defaults for everything but the database
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        ServerConfig {
            database_url: database_url.into(),
            listen_addr: default_listen_addr(),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            database_acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            cors_allowed_origin: None,
        }
    }
}
