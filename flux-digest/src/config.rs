//! Process configuration loaded from environment variables.
//!
//! Supported env vars (all optional):
//! - `PORT` / `BIND_ADDRESS` - HTTP listener
//! - `DATABASE_URL` or `DB_PATH` - SQLite queue location
//! - `OLLAMA_URL` / `OLLAMA_MODEL` - summarization service
//! - `MINIFLUX_URL` / `MINIFLUX_API_KEY` - publish target
//! - `QUEUE_INTERVAL_MS` / `MAX_RETRIES` / `JOB_TIMEOUT_SECS` - worker
//! - `REQUEST_TIMEOUT_SECS` - per-request HTTP timeout
//! - `LOG_DIR` - enables daily rolling log files

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    pub database_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub miniflux_url: String,
    pub miniflux_api_key: String,
    pub queue_interval_ms: u64,
    pub max_retries: u32,
    pub job_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            database_url: database_url_for_path("./data/queue.db"),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            miniflux_url: "http://localhost:8080".to_string(),
            miniflux_api_key: String::new(),
            queue_interval_ms: 2000,
            max_retries: 3,
            job_timeout_secs: 300,
            request_timeout_secs: 120,
            log_dir: None,
        }
    }
}

fn database_url_for_path(path: &str) -> String {
    format!("sqlite:{}?mode=rwc", path.replace('\\', "/"))
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|e| Error::config(format!("invalid {}={:?}: {}", name, value, e))),
        _ => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match (non_empty("DATABASE_URL"), non_empty("DB_PATH")) {
            (Some(url), _) => url,
            (None, Some(path)) => database_url_for_path(&path),
            (None, None) => defaults.database_url,
        };

        let config = Self {
            bind_address: non_empty("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parse_var("PORT", lookup("PORT"), defaults.port)?,
            database_url,
            ollama_url: non_empty("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: non_empty("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            miniflux_url: non_empty("MINIFLUX_URL").unwrap_or(defaults.miniflux_url),
            miniflux_api_key: lookup("MINIFLUX_API_KEY").unwrap_or_default(),
            queue_interval_ms: parse_var(
                "QUEUE_INTERVAL_MS",
                lookup("QUEUE_INTERVAL_MS"),
                defaults.queue_interval_ms,
            )?,
            max_retries: parse_var("MAX_RETRIES", lookup("MAX_RETRIES"), defaults.max_retries)?,
            job_timeout_secs: parse_var(
                "JOB_TIMEOUT_SECS",
                lookup("JOB_TIMEOUT_SECS"),
                defaults.job_timeout_secs,
            )?,
            request_timeout_secs: parse_var(
                "REQUEST_TIMEOUT_SECS",
                lookup("REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout_secs,
            )?,
            log_dir: non_empty("LOG_DIR").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue_interval_ms == 0 {
            return Err(Error::config("QUEUE_INTERVAL_MS must be greater than 0"));
        }
        if self.max_retries == 0 {
            return Err(Error::config("MAX_RETRIES must be at least 1"));
        }
        if self.job_timeout_secs == 0 {
            return Err(Error::config("JOB_TIMEOUT_SECS must be greater than 0"));
        }
        Ok(())
    }

    pub fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue_interval_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite:./data/queue.db?mode=rwc");
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.ollama_model, "llama3");
        assert_eq!(config.queue_interval_ms, 2000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.miniflux_url, "http://localhost:8080");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8081"),
            ("DB_PATH", "/var/lib/flux/queue.db"),
            ("OLLAMA_MODEL", "qwen2.5"),
            ("QUEUE_INTERVAL_MS", "500"),
            ("MAX_RETRIES", "5"),
            ("MINIFLUX_API_KEY", "secret"),
            ("LOG_DIR", "/var/log/flux"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.database_url, "sqlite:/var/lib/flux/queue.db?mode=rwc");
        assert_eq!(config.ollama_model, "qwen2.5");
        assert_eq!(config.queue_interval(), Duration::from_millis(500));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.miniflux_api_key, "secret");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/flux")));
    }

    #[test]
    fn test_database_url_wins_over_path() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DB_PATH", "ignored.db"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = load(&[("MAX_RETRIES", "three")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("MAX_RETRIES"));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        assert!(load(&[("MAX_RETRIES", "0")]).is_err());
        assert!(load(&[("QUEUE_INTERVAL_MS", "0")]).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("PORT", "  "), ("OLLAMA_URL", "")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.ollama_url, "http://localhost:11434");
    }
}
