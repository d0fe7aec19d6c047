//! Command-line arguments for the `actrack` binary

use chrono::{DateTime, Local, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "actrack")]
#[command(about = "Actrack - activity stopwatch with presence sync", long_about = None)]
pub struct Cli {
    /// Log level (defaults to the configured level)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Show both stopwatches
    Status,

    /// Select an activity for the main (or sub) stopwatch
    Start {
        /// Activity id or name
        activity: String,
        #[arg(long)]
        sub: bool,
    },

    /// Finish the running stopwatch and record it
    Complete {
        #[arg(long)]
        sub: bool,
        #[arg(long)]
        memo: Option<String>,
    },

    /// Discard the running stopwatch
    Cancel {
        #[arg(long)]
        sub: bool,
    },

    /// Correct the start time of the running stopwatch
    EditStart {
        #[arg(long)]
        sub: bool,
        /// RFC 3339 timestamp or local HH:MM today
        at: String,
    },

    /// Set the memo of the running stopwatch
    Memo {
        #[arg(long)]
        sub: bool,
        text: String,
        /// Also publish the memo as presence details
        #[arg(long)]
        sync: bool,
    },

    /// Record a value for a counted activity
    Count {
        activity: String,
        value: i64,
        #[arg(long)]
        memo: Option<String>,
    },

    /// Print the display time on every tick until Ctrl-C
    Watch,

    /// Resubmit records that could not be saved
    Retry,

    /// Show or update configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct ConfigArgs {
    /// Base URL of the presence service (empty to unset)
    #[arg(long)]
    pub presence_endpoint: Option<String>,

    #[arg(long, value_parser = parse_switch)]
    pub presence: Option<bool>,

    #[arg(long, value_parser = parse_switch)]
    pub auto_start_main: Option<bool>,

    #[arg(long)]
    pub tick_ms: Option<u64>,
}

impl ConfigArgs {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

/// Parse an RFC 3339 timestamp, or `HH:MM` as a local time on the day of `now`.
pub fn parse_start_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }

    let time = NaiveTime::parse_from_str(input, "%H:%M")
        .map_err(|_| format!("'{}' is neither RFC 3339 nor HH:MM", input))?;
    now.with_timezone(&Local)
        .date_naive()
        .and_time(time)
        .and_local_timezone(Local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' does not exist in the local timezone today", input))
}
