//! Server configuration from the process environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use pitlane_runtime::RaceConfig;
use pitlane_store::DEFAULT_STATE_FILE;
use thiserror::Error;

use crate::RoleKeys;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Delay before a wrong access key is reported
pub const AUTH_FAILURE_DELAY: Duration = Duration::from_millis(500);

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingKey(&'static str),

    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("Invalid PITLANE_RACE_DURATION value {value}: {source}")]
    InvalidDuration {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Deployment environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    /// Shortened races
    Development,
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub state_file: PathBuf,
    pub environment: Environment,
    /// Overrides the environment's race length
    pub race_duration: Option<Duration>,
    pub keys: RoleKeys,
    pub auth_failure_delay: Duration,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Read configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingKey(name))
        };
        let keys = RoleKeys {
            receptionist: required("RECEPTIONIST_KEY")?,
            observer: required("OBSERVER_KEY")?,
            safety: required("SAFETY_KEY")?,
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let environment = match lookup("PITLANE_ENV").as_deref() {
            Some("development") => Environment::Development,
            _ => Environment::Production,
        };

        let race_duration = lookup("PITLANE_RACE_DURATION")
            .map(|value| {
                humantime::parse_duration(value.trim())
                    .map_err(|source| ConfigError::InvalidDuration { value, source })
            })
            .transpose()?;

        let log_format = match lookup("PITLANE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(ServerConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            state_file: lookup("PITLANE_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            environment,
            race_duration,
            keys,
            auth_failure_delay: AUTH_FAILURE_DELAY,
            log_format,
        })
    }

    /// Race settings for this deployment
    pub fn race_config(&self) -> RaceConfig {
        let config = match self.environment {
            Environment::Production => RaceConfig::default(),
            Environment::Development => RaceConfig::development(),
        };
        match self.race_duration {
            Some(duration) => config.with_race_duration(duration),
            None => config,
        }
    }
}
