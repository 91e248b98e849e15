//! Application configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::application::{AggregatorConfig, GroupReadMode};
use crate::domain::entities::UserId;

const APP_QUALIFIER: &str = "io";
const APP_ORGANIZATION: &str = "msg-transfer";
const APP_NAME: &str = "msg-transfer";

const DEFAULT_DELAY_MS: u64 = 1000;
const DEFAULT_DELAY_COUNT: usize = 10;
const DEFAULT_SYSTEM_ID: &str = "system_root";
const DEFAULT_PUSH_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Group read receipt handling.
    #[serde(default)]
    pub read_receipt: ReadReceiptConfig,

    /// Push delivery.
    #[serde(default)]
    pub push: PushConfig,

    /// Queue consumption.
    #[serde(default)]
    pub consumer: ConsumerConfig,

    /// Static group membership, group id to member ids.
    #[serde(default)]
    pub groups: BTreeMap<UserId, Vec<UserId>>,
}

/// Group read receipt configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptConfig {
    /// Whether group receipts are merged or forwarded one by one.
    #[serde(default)]
    pub mode: GroupReadMode,

    /// Maximum wait before a merged payload is flushed, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Merged receipts that force an early flush.
    #[serde(default = "default_delay_count")]
    pub delay_count: usize,
}

impl Default for ReadReceiptConfig {
    fn default() -> Self {
        Self {
            mode: GroupReadMode::default(),
            delay_ms: DEFAULT_DELAY_MS,
            delay_count: DEFAULT_DELAY_COUNT,
        }
    }
}

impl ReadReceiptConfig {
    /// Aggregator thresholds; zero values fall back to the defaults.
    #[must_use]
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig::new(Duration::from_millis(self.delay_ms), self.delay_count)
    }
}

/// Push delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Websocket endpoint of the push layer. Frames are only logged when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Identity frames are sent as.
    #[serde(default = "default_system_id")]
    pub system_id: UserId,

    /// Token presented to the push layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Capacity of the read receipt output channel.
    #[serde(default = "default_push_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            system_id: default_system_id(),
            token: None,
            channel_capacity: DEFAULT_PUSH_CHANNEL_CAPACITY,
        }
    }
}

/// Queue consumption configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Capacity of each per-topic channel.
    #[serde(default = "default_topic_capacity")]
    pub topic_capacity: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
        }
    }
}

const fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

const fn default_delay_count() -> usize {
    DEFAULT_DELAY_COUNT
}

fn default_system_id() -> UserId {
    UserId::from(DEFAULT_SYSTEM_ID)
}

const fn default_push_channel_capacity() -> usize {
    DEFAULT_PUSH_CHANNEL_CAPACITY
}

const fn default_topic_capacity() -> usize {
    DEFAULT_TOPIC_CAPACITY
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(mode) = args.read_mode {
            self.read_receipt.mode = mode;
        }
        if let Some(delay_ms) = args.delay_ms {
            self.read_receipt.delay_ms = delay_ms;
        }
        if let Some(delay_count) = args.delay_count {
            self.read_receipt.delay_count = delay_count;
        }
        if let Some(endpoint) = args.push_endpoint {
            self.push.endpoint = Some(endpoint);
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Push channel capacity, never zero.
    #[must_use]
    pub fn push_channel_capacity(&self) -> usize {
        self.push.channel_capacity.max(1)
    }

    /// Per-topic channel capacity, never zero.
    #[must_use]
    pub fn topic_capacity(&self) -> usize {
        self.consumer.topic_capacity.max(1)
    }
}
