//! Configuration loaded from environment variables.

use crate::error::ControllerError;
use chrono::TimeDelta;
use std::env;
use std::time::Duration;

const DEFAULT_MUTE_SECONDS: u64 = 300;
const DEFAULT_CLUSTER_NAME: &str = "kubernetes";
const DEFAULT_WORKERS: usize = 1;
const DEFAULT_WEBHOOK_TIMEOUT_SECONDS: u64 = 10;

/// Runtime settings for the alerter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Teams incoming webhook URL (`MICROSOFT_TEAMS_WEBHOOK_URL`, required)
    pub webhook_url: String,
    /// Minimum time between two alerts for one container (`MUTE_SECONDS`)
    pub mute_seconds: u64,
    /// Name shown in every alert (`CLUSTER_NAME`)
    pub cluster_name: String,
    /// Number of reconcile workers (`WORKERS`)
    pub workers: usize,
    /// Namespace to watch; all namespaces when `None` (`WATCH_NAMESPACE`)
    pub namespace: Option<String>,
    /// Per-request webhook timeout (`WEBHOOK_TIMEOUT_SECONDS`)
    pub webhook_timeout: Duration,
    /// Post a notice when the alerter starts (`SEND_STARTUP_MESSAGE`)
    pub send_startup_message: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let webhook_url = get("MICROSOFT_TEAMS_WEBHOOK_URL").ok_or_else(|| {
            ControllerError::InvalidConfig(
                "MICROSOFT_TEAMS_WEBHOOK_URL environment variable is required".to_string(),
            )
        })?;

        let mute_seconds = parse_or("MUTE_SECONDS", get("MUTE_SECONDS"), DEFAULT_MUTE_SECONDS)?;
        let workers = parse_or("WORKERS", get("WORKERS"), DEFAULT_WORKERS)?;
        if workers == 0 {
            return Err(ControllerError::InvalidConfig("WORKERS must be at least 1".to_string()));
        }
        let timeout_seconds = parse_or(
            "WEBHOOK_TIMEOUT_SECONDS",
            get("WEBHOOK_TIMEOUT_SECONDS"),
            DEFAULT_WEBHOOK_TIMEOUT_SECONDS,
        )?;
        if timeout_seconds == 0 {
            return Err(ControllerError::InvalidConfig(
                "WEBHOOK_TIMEOUT_SECONDS must be at least 1".to_string(),
            ));
        }
        let send_startup_message = match get("SEND_STARTUP_MESSAGE") {
            None => true,
            Some(value) => parse_bool("SEND_STARTUP_MESSAGE", &value)?,
        };

        Ok(Self {
            webhook_url,
            mute_seconds,
            cluster_name: get("CLUSTER_NAME").unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string()),
            workers,
            namespace: get("WATCH_NAMESPACE"),
            webhook_timeout: Duration::from_secs(timeout_seconds),
            send_startup_message,
        })
    }

    /// Mute window as a chrono delta, for comparing timestamps.
    pub fn mute_window(&self) -> TimeDelta {
        i64::try_from(self.mute_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T, ControllerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{name}='{raw}': {e}"))),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ControllerError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ControllerError::InvalidConfig(format!(
            "{name}='{value}': expected true or false"
        ))),
    }
}
