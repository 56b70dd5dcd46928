//! Environment-driven configuration.
//!
//! Every setting has a default suitable for local development; production
//! deployments override them through environment variables (optionally via
//! a `.env` file loaded by `dotenvy` in `main`).

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use genstudio_core::extension::ExtensionPolicy;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// Which generation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// The REST generation gateway.
    Http,
    /// The offline scripted provider.
    Scripted,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "scripted" => Ok(Self::Scripted),
            other => Err(format!("expected 'http' or 'scripted', got '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight jobs, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
}

/// Job engine timings and limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a finished job stays pollable, counted from creation.
    pub job_ttl: chrono::Duration,
    /// Idle lifetime of an editing session.
    pub session_ttl: chrono::Duration,
    /// Wall-clock budget of a whole job.
    pub processing_job_max: Duration,
    /// Longest silence tolerated between two provider events, image jobs.
    pub image_call_timeout: Duration,
    /// Longest silence tolerated between two provider events, video jobs.
    pub video_call_timeout: Duration,
    pub janitor_interval: Duration,
    /// Poll period of job watches.
    pub watch_interval: Duration,
    pub extension: ExtensionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            job_ttl: chrono::Duration::hours(24),
            session_ttl: chrono::Duration::hours(6),
            processing_job_max: Duration::from_secs(1800),
            image_call_timeout: Duration::from_secs(180),
            video_call_timeout: Duration::from_secs(600),
            janitor_interval: Duration::from_secs(300),
            watch_interval: Duration::from_millis(1000),
            extension: ExtensionPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Reject settings that would break engine guarantees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing_job_max.is_zero() {
            return Err(ConfigError::Inconsistent(
                "PROCESSING_JOB_MAX_SECONDS must be greater than 0".to_string(),
            ));
        }
        if self.janitor_interval.is_zero() || self.watch_interval.is_zero() {
            return Err(ConfigError::Inconsistent(
                "JANITOR_INTERVAL_SECS and WATCH_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        // A finished job must stay pollable after the longest possible run.
        let job_ttl = self.job_ttl.to_std().unwrap_or(Duration::ZERO);
        if job_ttl <= self.processing_job_max {
            return Err(ConfigError::Inconsistent(format!(
                "JOB_TTL_HOURS ({}s) must exceed PROCESSING_JOB_MAX_SECONDS ({}s)",
                job_ttl.as_secs(),
                self.processing_job_max.as_secs()
            )));
        }
        // A session touched when an edit is submitted must outlive that edit.
        let session_ttl = self.session_ttl.to_std().unwrap_or(Duration::ZERO);
        if session_ttl <= self.processing_job_max {
            return Err(ConfigError::Inconsistent(format!(
                "SESSION_TTL_HOURS ({}s) must exceed PROCESSING_JOB_MAX_SECONDS ({}s)",
                session_ttl.as_secs(),
                self.processing_job_max.as_secs()
            )));
        }
        if self.extension.increment_secs == 0 {
            return Err(ConfigError::Inconsistent(
                "EXTENSION_INCREMENT_SECONDS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// History persistence settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub history_file: PathBuf,
    pub history_max_items: usize,
}

/// Generation backend settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    /// Delay between events of the scripted provider.
    pub scripted_step: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `8080`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                       |
    /// | `LOG_FORMAT`                  | `text`                     |
    /// | `JOB_TTL_HOURS`               | `24`                       |
    /// | `SESSION_TTL_HOURS`           | `6`                        |
    /// | `PROCESSING_JOB_MAX_SECONDS`  | `1800`                     |
    /// | `IMAGE_CALL_TIMEOUT_SECS`     | `180`                      |
    /// | `VIDEO_CALL_TIMEOUT_SECS`     | `600`                      |
    /// | `JANITOR_INTERVAL_SECS`       | `300`                      |
    /// | `WATCH_INTERVAL_MS`           | `1000`                     |
    /// | `EXTENSION_BASE_SECONDS`      | `8`                        |
    /// | `EXTENSION_INCREMENT_SECONDS` | `7`                        |
    /// | `EXTENSION_MAX_COUNT`         | `20`                       |
    /// | `HISTORY_FILE`                | `data/history.json`        |
    /// | `HISTORY_MAX_ITEMS`           | `1000`                     |
    /// | `PROVIDER`                    | `http`                     |
    /// | `PROVIDER_BASE_URL`           | `http://127.0.0.1:8090`    |
    /// | `PROVIDER_API_KEY`            | unset                      |
    /// | `PROVIDER_POLL_INTERVAL_SECS` | `10`                       |
    /// | `SCRIPTED_STEP_MS`            | `500`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);
        let defaults = EngineConfig::default();

        let engine = EngineConfig {
            job_ttl: env.hours("JOB_TTL_HOURS", 24)?,
            session_ttl: env.hours("SESSION_TTL_HOURS", 6)?,
            processing_job_max: Duration::from_secs(
                env.parse("PROCESSING_JOB_MAX_SECONDS", 1800_u64)?,
            ),
            image_call_timeout: Duration::from_secs(env.parse("IMAGE_CALL_TIMEOUT_SECS", 180_u64)?),
            video_call_timeout: Duration::from_secs(env.parse("VIDEO_CALL_TIMEOUT_SECS", 600_u64)?),
            janitor_interval: Duration::from_secs(env.parse("JANITOR_INTERVAL_SECS", 300_u64)?),
            watch_interval: Duration::from_millis(env.parse("WATCH_INTERVAL_MS", 1000_u64)?),
            extension: ExtensionPolicy {
                base_duration_secs: env.parse(
                    "EXTENSION_BASE_SECONDS",
                    defaults.extension.base_duration_secs,
                )?,
                increment_secs: env.parse(
                    "EXTENSION_INCREMENT_SECONDS",
                    defaults.extension.increment_secs,
                )?,
                max_extensions: env
                    .parse("EXTENSION_MAX_COUNT", defaults.extension.max_extensions)?,
                extendable_resolution: defaults.extension.extendable_resolution,
            },
        };
        engine.validate()?;

        let storage = StorageConfig {
            history_file: PathBuf::from(env.string("HISTORY_FILE", "data/history.json")),
            history_max_items: env.parse(
                "HISTORY_MAX_ITEMS",
                genstudio_store::history::DEFAULT_MAX_ITEMS,
            )?,
        };

        let provider = ProviderConfig {
            kind: env.parse("PROVIDER", ProviderKind::Http)?,
            base_url: env.string("PROVIDER_BASE_URL", "http://127.0.0.1:8090"),
            api_key: env.optional("PROVIDER_API_KEY"),
            poll_interval: Duration::from_secs(env.parse("PROVIDER_POLL_INTERVAL_SECS", 10_u64)?),
            scripted_step: Duration::from_millis(env.parse("SCRIPTED_STEP_MS", 500_u64)?),
        };

        let cors_origins: Vec<String> = env
            .string("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 8080_u16)?,
            cors_origins,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", 30_u64)?,
            shutdown_timeout_secs: env.parse("SHUTDOWN_TIMEOUT_SECS", 30_u64)?,
            log_format: env.parse("LOG_FORMAT", LogFormat::Text)?,
            engine,
            storage,
            provider,
        })
    }
}

/* --------------------------------------------------------------------------
Lookup helpers
-------------------------------------------------------------------------- */

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Non-empty value of `key`, if set.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// A whole number of hours, rejected when `chrono` cannot represent it.
    fn hours(&self, key: &'static str, default: i64) -> Result<chrono::Duration, ConfigError> {
        let hours = self.parse(key, default)?;
        chrono::Duration::try_hours(hours).ok_or_else(|| ConfigError::Invalid {
            key,
            value: hours.to_string(),
            reason: "out of range".to_string(),
        })
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: value.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
