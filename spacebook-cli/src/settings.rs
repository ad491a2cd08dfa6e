use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use spacebook_client::REQUEST_TIMEOUT;

pub const DEFAULT_API_URL: &str = "http://localhost:3333/api/1.0.0";
pub const DEFAULT_DATA_DIR: &str = ".spacebook";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let api_url = non_empty(std::env::var("SPACEBOOK_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let data_dir = non_empty(std::env::var("SPACEBOOK_DATA_DIR").ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let poll_interval = parse_secs(
            "SPACEBOOK_POLL_INTERVAL_SECS",
            std::env::var("SPACEBOOK_POLL_INTERVAL_SECS").ok(),
            60,
        )?;
        let max_poll_interval = parse_secs(
            "SPACEBOOK_MAX_POLL_INTERVAL_SECS",
            std::env::var("SPACEBOOK_MAX_POLL_INTERVAL_SECS").ok(),
            900,
        )?;
        let request_timeout = parse_secs(
            "SPACEBOOK_REQUEST_TIMEOUT_SECS",
            std::env::var("SPACEBOOK_REQUEST_TIMEOUT_SECS").ok(),
            REQUEST_TIMEOUT.as_secs(),
        )?;
        let log_level = std::env::var("LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_url,
            data_dir,
            poll_interval,
            max_poll_interval,
            request_timeout,
            log_level,
        })
    }

    /// Флаги командной строки важнее переменных окружения.
    pub fn with_overrides(mut self, server: Option<String>, data_dir: Option<PathBuf>) -> Self {
        if let Some(server) = non_empty(server) {
            self.api_url = normalize_server(server);
        }
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> Result<Duration> {
    let value = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?,
        None => default,
    };

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(Duration::from_secs(value))
}
