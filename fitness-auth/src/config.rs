use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DATABASE_URL_ENV: &str = "FITNESS_AUTH_DATABASE_URL";
const LOG_JSON_ENV: &str = "FITNESS_AUTH_LOG_JSON";

const DEFAULT_DATABASE_URL: &str = "sqlite://fitness-auth.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Parser)]
#[command(
    name = "fitness-auth",
    version,
    about = "Account registration and profile backend for the fitness app"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    #[arg(long, value_name = "N")]
    pub max_connections: Option<u32>,

    /// How long to wait for a pooled connection, e.g. `5s` or `500ms`.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub acquire_timeout: Option<Duration>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub database: DatabaseConfig,
    pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid duration for {key}: {value}")]
    InvalidDuration { key: String, value: String },
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("env var {key} is not valid unicode")]
    NotUnicode { key: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout: Option<String>,
    log_json: Option<bool>,
}

/// Values read from the process environment. Kept separate so precedence
/// can be tested without touching the real environment.
#[derive(Debug, Default)]
struct EnvConfig {
    database_url: Option<String>,
    log_json: Option<bool>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let from_env = read_env_config()?;
        Self::merge(cli, from_env, from_file)
    }

    fn merge(cli: Cli, env: EnvConfig, file: FileConfig) -> Result<Self, ConfigError> {
        let bind = cli
            .bind
            .or(file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));
        let url = cli
            .database_url
            .or(env.database_url)
            .or(file.database_url)
            .unwrap_or_else(|| String::from(DEFAULT_DATABASE_URL));
        let max_connections = cli
            .max_connections
            .or(file.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
            .max(1);
        let acquire_timeout = match (cli.acquire_timeout, file.acquire_timeout) {
            (Some(timeout), _) => timeout,
            (None, Some(raw)) => humantime::parse_duration(raw.trim()).map_err(|_| {
                ConfigError::InvalidDuration {
                    key: String::from("acquire_timeout"),
                    value: raw,
                }
            })?,
            (None, None) => DEFAULT_ACQUIRE_TIMEOUT,
        };
        let log_json = env.log_json.or(file.log_json).unwrap_or(false);

        Ok(Self {
            bind,
            database: DatabaseConfig {
                url,
                max_connections,
                acquire_timeout,
            },
            log_json,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_config() -> Result<EnvConfig, ConfigError> {
    Ok(EnvConfig {
        database_url: read_env_string(DATABASE_URL_ENV)?,
        log_json: read_log_json_env()?,
    })
}

fn read_log_json_env() -> Result<Option<bool>, ConfigError> {
    read_env_string(LOG_JSON_ENV)?
        .map(|value| parse_bool_value(LOG_JSON_ENV, &value))
        .transpose()
}

fn read_env_string(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: String::from(key),
        }),
    }
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}
