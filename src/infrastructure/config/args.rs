use std::path::PathBuf;

use clap::Parser;

use super::app_config::LogLevel;
use crate::application::GroupReadMode;

/// Command-line overrides for [`AppConfig`](super::AppConfig).
#[derive(Debug, Parser)]
#[command(
    name = "msg-transfer",
    version,
    about = "Persists chat messages and fans out message and read-receipt pushes",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Group read receipt handling (batched or immediate).
    #[arg(long, value_name = "MODE")]
    pub read_mode: Option<GroupReadMode>,

    /// Maximum wait before merged read receipts are flushed, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Merged read receipts that force an early flush.
    #[arg(long, value_name = "COUNT")]
    pub delay_count: Option<usize>,

    /// Websocket endpoint of the push layer.
    #[arg(long, value_name = "URL")]
    pub push_endpoint: Option<String>,
}
