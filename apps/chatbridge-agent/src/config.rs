use std::{env, fs, path::Path, time::Duration};

use chatbridge_layout::LayoutLabels;
use chatbridge_protocol::DeliveryPolicy;
use thiserror::Error;

/// Smallest poll interval a host may request.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    pub poll_interval: Duration,
    pub ack_timeout: Duration,
    pub max_ack_retries: u32,
    /// Bounded wait on the command queue per loop iteration.
    pub tick: Duration,
    pub message_batch: usize,
    pub max_listen_targets: usize,
    pub restore_clipboard: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(800),
            ack_timeout: Duration::from_millis(3_000),
            max_ack_retries: 3,
            tick: Duration::from_millis(100),
            message_batch: 20,
            max_listen_targets: 50,
            restore_clipboard: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CHATBRIDGE_POLL_INTERVAL_MS: {0}")]
    InvalidPollIntervalMs(String),
    #[error("invalid CHATBRIDGE_ACK_TIMEOUT_MS: {0}")]
    InvalidAckTimeoutMs(String),
    #[error("invalid CHATBRIDGE_MAX_ACK_RETRIES: {0}")]
    InvalidMaxAckRetries(String),
    #[error("invalid CHATBRIDGE_TICK_MS: {0}")]
    InvalidTickMs(String),
    #[error("invalid CHATBRIDGE_MESSAGE_BATCH: {0}")]
    InvalidMessageBatch(String),
    #[error("invalid CHATBRIDGE_MAX_LISTEN_TARGETS: {0}")]
    InvalidMaxListenTargets(String),
    #[error("invalid CHATBRIDGE_RESTORE_CLIPBOARD: {0}")]
    InvalidRestoreClipboard(String),
    #[error("failed to read layout labels from {path}: {source}")]
    LabelsRead {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid layout labels in {path}: {source}")]
    LabelsParse {
        path: String,
        source: toml::de::Error,
    },
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let poll_interval_ms = parse_u64_lookup(
            lookup,
            "CHATBRIDGE_POLL_INTERVAL_MS",
            duration_ms(defaults.poll_interval),
            ConfigError::InvalidPollIntervalMs,
        )?;
        let ack_timeout_ms = parse_u64_lookup(
            lookup,
            "CHATBRIDGE_ACK_TIMEOUT_MS",
            duration_ms(defaults.ack_timeout),
            ConfigError::InvalidAckTimeoutMs,
        )?;
        let max_ack_retries = parse_u64_lookup(
            lookup,
            "CHATBRIDGE_MAX_ACK_RETRIES",
            u64::from(defaults.max_ack_retries),
            ConfigError::InvalidMaxAckRetries,
        )?;
        let tick_ms = parse_u64_lookup(
            lookup,
            "CHATBRIDGE_TICK_MS",
            duration_ms(defaults.tick),
            ConfigError::InvalidTickMs,
        )?;
        let message_batch = parse_u64_lookup(
            lookup,
            "CHATBRIDGE_MESSAGE_BATCH",
            defaults.message_batch as u64,
            ConfigError::InvalidMessageBatch,
        )?;
        let max_listen_targets = parse_u64_lookup(
            lookup,
            "CHATBRIDGE_MAX_LISTEN_TARGETS",
            defaults.max_listen_targets as u64,
            ConfigError::InvalidMaxListenTargets,
        )?;
        let restore_clipboard = match lookup("CHATBRIDGE_RESTORE_CLIPBOARD") {
            Some(raw) => parse_bool(&raw).map_err(ConfigError::InvalidRestoreClipboard)?,
            None => defaults.restore_clipboard,
        };

        if tick_ms == 0 {
            return Err(ConfigError::InvalidTickMs("must be greater than zero".to_string()));
        }
        if message_batch == 0 {
            return Err(ConfigError::InvalidMessageBatch(
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            poll_interval: Duration::from_millis(poll_interval_ms).max(MIN_POLL_INTERVAL),
            ack_timeout: Duration::from_millis(ack_timeout_ms),
            max_ack_retries: u32::try_from(max_ack_retries)
                .map_err(|error| ConfigError::InvalidMaxAckRetries(error.to_string()))?,
            tick: Duration::from_millis(tick_ms),
            message_batch: usize::try_from(message_batch)
                .map_err(|error| ConfigError::InvalidMessageBatch(error.to_string()))?,
            max_listen_targets: usize::try_from(max_listen_targets)
                .map_err(|error| ConfigError::InvalidMaxListenTargets(error.to_string()))?,
            restore_clipboard,
        })
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            ack_timeout: self.ack_timeout,
            max_retries: self.max_ack_retries,
        }
    }
}

/// Reads a [`LayoutLabels`] TOML file. Keys left out keep their defaults.
pub fn load_layout_labels(path: &Path) -> Result<LayoutLabels, ConfigError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::LabelsRead {
        path: display.clone(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::LabelsParse {
        path: display,
        source,
    })
}

fn parse_u64_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    invalid: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|error| invalid(format!("{raw:?}: {error}"))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(other.to_string()),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
