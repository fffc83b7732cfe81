use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_SESSION_TTL: &str = "8h";
const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 3600);
const MAX_EDIT_WINDOW_MINUTES: i64 = 365 * 24 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "cabelostrade",
    version,
    about = "REST backend for a human hair marketplace"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Admin console and support staff credentials (TOML).
    #[arg(long, value_name = "FILE")]
    pub auth_file: Option<PathBuf>,

    /// Insert the demo sellers and listings on startup.
    #[arg(long)]
    pub seed_demo: bool,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub auth_file: Option<PathBuf>,
    pub identity: IdentityConfig,
    pub secure_cookies: bool,
    pub seed_demo: bool,
    pub edit_window: chrono::Duration,
    pub max_upload_bytes: usize,
    pub admin_session_ttl: Duration,
    pub support_session_ttl: Duration,
    pub setup_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
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
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("invalid duration for {key}: {value}")]
    InvalidDuration { key: String, value: String },
    #[error("{key} = {value} is out of range (max {max})")]
    OutOfRange {
        key: &'static str,
        value: String,
        max: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    database_max_connections: Option<u32>,
    auth_file: Option<PathBuf>,
    #[serde(default)]
    identity: IdentityConfig,
    secure_cookies: Option<bool>,
    seed_demo: Option<bool>,
    edit_window_minutes: Option<i64>,
    max_upload_bytes: Option<usize>,
    admin_session_ttl: Option<String>,
    support_session_ttl: Option<String>,
    #[serde(default)]
    setup_keys: Vec<String>,
}

/// Values taken from `CABELOS_*` environment variables.
#[derive(Debug, Default)]
struct EnvOverrides {
    database_url: Option<String>,
    identity_api_url: Option<String>,
    identity_api_key: Option<String>,
    secure_cookies: Option<bool>,
}

impl EnvOverrides {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: read_env_string("CABELOS_DATABASE_URL"),
            identity_api_url: read_env_string("CABELOS_IDENTITY_API_URL"),
            identity_api_key: read_env_string("CABELOS_IDENTITY_API_KEY"),
            secure_cookies: read_env_bool("CABELOS_SECURE_COOKIES")?,
        })
    }
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let env = EnvOverrides::from_env()?;
        Self::merge(cli, from_file, env)
    }

    fn merge(cli: Cli, from_file: FileConfig, env: EnvOverrides) -> Result<Self, ConfigError> {
        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8787)));
        let database_url = cli
            .database_url
            .or(env.database_url)
            .or(from_file.database_url)
            .unwrap_or_else(|| String::from("sqlite://cabelostrade.db"));
        let identity = IdentityConfig {
            api_url: env.identity_api_url.or(from_file.identity.api_url),
            api_key: env.identity_api_key.or(from_file.identity.api_key),
        };

        let admin_session_ttl = parse_ttl(
            "admin_session_ttl",
            from_file.admin_session_ttl.as_deref(),
        )?;
        let support_session_ttl = parse_ttl(
            "support_session_ttl",
            from_file.support_session_ttl.as_deref(),
        )?;
        let edit_window = edit_window(from_file.edit_window_minutes.unwrap_or(30))?;

        Ok(Self {
            bind,
            database_url,
            database_max_connections: from_file.database_max_connections.unwrap_or(5).max(1),
            auth_file: cli.auth_file.or(from_file.auth_file),
            identity,
            secure_cookies: env.secure_cookies.or(from_file.secure_cookies).unwrap_or(true),
            seed_demo: cli.seed_demo || from_file.seed_demo.unwrap_or(false),
            edit_window,
            max_upload_bytes: from_file
                .max_upload_bytes
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            admin_session_ttl,
            support_session_ttl,
            setup_keys: from_file.setup_keys,
        })
    }
}

/// Session lifetime from a humantime string; zero is invalid.
fn parse_ttl(key: &'static str, raw: Option<&str>) -> Result<Duration, ConfigError> {
    let raw = raw.unwrap_or(DEFAULT_SESSION_TTL);
    match humantime::parse_duration(raw) {
        Ok(ttl) if ttl > MAX_SESSION_TTL => Err(ConfigError::OutOfRange {
            key,
            value: String::from(raw),
            max: humantime::format_duration(MAX_SESSION_TTL).to_string(),
        }),
        Ok(ttl) if !ttl.is_zero() => Ok(ttl),
        _ => Err(ConfigError::InvalidDuration {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}

/// Listing edit window; values below one minute are raised to one.
fn edit_window(minutes: i64) -> Result<chrono::Duration, ConfigError> {
    if minutes > MAX_EDIT_WINDOW_MINUTES {
        return Err(ConfigError::OutOfRange {
            key: "edit_window_minutes",
            value: minutes.to_string(),
            max: MAX_EDIT_WINDOW_MINUTES.to_string(),
        });
    }
    chrono::Duration::try_minutes(minutes.max(1)).ok_or_else(|| ConfigError::OutOfRange {
        key: "edit_window_minutes",
        value: minutes.to_string(),
        max: MAX_EDIT_WINDOW_MINUTES.to_string(),
    })
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

fn read_env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => parse_bool_value(key, &value).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from("<non-unicode>"),
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
