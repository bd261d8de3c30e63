//! Command-line interface

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::lines::{Backend, LineId};

/// Watch GPIO input lines and broadcast state changes to TCP listeners
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "LINEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Line to monitor, like this: '23:Thing attached to pin 23' (repeatable)
    #[arg(short = 'n', long = "name", value_name = "ID:NAME", value_parser = parse_line_name)]
    pub names: Vec<(LineId, String)>,

    /// State display name, like this: '1:Pin enabled' (repeatable)
    #[arg(short = 's', long = "state", value_name = "VALUE:NAME", value_parser = parse_state_name)]
    pub states: Vec<(u8, String)>,

    /// TCP listen port; absent or <= 0 disables the network sink
    #[arg(
        short = 'l',
        long = "listen",
        value_name = "PORT",
        env = "LINEWATCH_LISTEN",
        allow_negative_numbers = true
    )]
    pub listen: Option<i64>,

    /// Address to bind the listener to
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<IpAddr>,

    /// Delay between sweeps, in milliseconds
    #[arg(short = 'i', long = "interval-ms", value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Line-access backend
    #[arg(long, value_enum, env = "LINEWATCH_BACKEND")]
    pub backend: Option<Backend>,

    /// sysfs GPIO root directory
    #[arg(long, value_name = "DIR")]
    pub gpio_root: Option<PathBuf>,

    /// Upper bound for one write to one subscriber, in milliseconds
    #[arg(long, value_name = "MS")]
    pub write_timeout_ms: Option<u64>,

    /// Drop a change if the broadcaster does not take it within this many
    /// milliseconds (default: wait)
    #[arg(long, value_name = "MS")]
    pub send_timeout_ms: Option<u64>,

    /// Capacity of the sampler-to-broadcaster channel
    #[arg(long, value_name = "N")]
    pub channel_capacity: Option<usize>,

    /// Also write notifications to the log (always on without a listener)
    #[arg(long)]
    pub log_changes: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Also write logs to a daily-rotated file at this path
    #[arg(long, env = "LINEWATCH_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    pub check: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Split `"xxx:stuff"` into a number 0-255 and the rest
///
/// Only the first ':' delimits, so names may contain colons.
pub fn parse_pair(arg: &str) -> Result<(u8, String), ConfigError> {
    let (number, name) = arg
        .split_once(':')
        .ok_or_else(|| ConfigError::MissingDelimiter(arg.to_string()))?;

    let value: i64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            arg: arg.to_string(),
            value: number.to_string(),
        })?;
    let value = u8::try_from(value).map_err(|_| ConfigError::OutOfRange(value))?;

    Ok((value, name.to_string()))
}

fn parse_line_name(arg: &str) -> Result<(LineId, String), ConfigError> {
    parse_pair(arg).map(|(id, name)| (LineId(id), name))
}

fn parse_state_name(arg: &str) -> Result<(u8, String), ConfigError> {
    parse_pair(arg)
}
