use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActivityBinding;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Durable snapshot of one stopwatch.
///
/// The display time is never stored; it is always derived from
/// `start_reference` and `accumulated_offset_ms` at read time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimerState {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_reference: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accumulated_offset_ms: i64,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub binding: Option<ActivityBinding>,
}

/// Which of the two stopwatches a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerSlot {
    Main,
    Sub,
}

impl TimerState {
    pub fn idle() -> Self {
        Self::default()
    }

    /// A fresh run beginning at `now`.
    pub fn started(now: DateTime<Utc>, binding: ActivityBinding) -> Self {
        Self {
            start_reference: Some(now),
            accumulated_offset_ms: 0,
            running: true,
            memo: String::new(),
            binding: Some(binding),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Banked offset plus the current segment, in milliseconds.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let segment = match (self.running, self.start_reference) {
            (true, Some(start)) => now.signed_duration_since(start).num_milliseconds().max(0),
            _ => 0,
        };
        self.accumulated_offset_ms + segment
    }

    /// Elapsed time in fractional minutes, the unit records are stored in.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        ms_to_minutes(self.elapsed_ms(now))
    }

    /// `running` and `start_reference` must agree, and the offset can't be negative.
    pub fn validate(&self) -> Result<()> {
        match (self.running, self.start_reference) {
            (true, None) => {
                return Err(Error::Inconsistent(
                    "running timer has no start reference".to_string(),
                ))
            }
            (false, Some(_)) => {
                return Err(Error::Inconsistent(
                    "stopped timer still has a start reference".to_string(),
                ))
            }
            _ => {}
        }

        if self.running && self.binding.is_none() {
            return Err(Error::Inconsistent(
                "running timer is not bound to an activity".to_string(),
            ));
        }

        if self.accumulated_offset_ms < 0 {
            return Err(Error::Inconsistent(format!(
                "negative accumulated offset {}",
                self.accumulated_offset_ms
            )));
        }

        Ok(())
    }
}

impl TimerSlot {
    /// Persistence key holding this slot's snapshot.
    pub fn storage_key(&self) -> &'static str {
        match self {
            TimerSlot::Main => "stopwatch_state",
            TimerSlot::Sub => "sub_stopwatch_state",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerSlot::Main => "main",
            TimerSlot::Sub => "sub",
        }
    }
}

impl std::fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

pub fn ms_to_minutes(ms: i64) -> f64 {
    ms as f64 / MS_PER_MINUTE
}

/// Render milliseconds as `HH:MM:SS`, truncating partial seconds.
pub fn format_elapsed(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
