//! Activity catalog entries and the binding an engine tracks against

use serde::{Deserialize, Serialize};

/// Asset shown by the presence service when an activity has none of its own.
pub const DEFAULT_ASSET_KEY: &str = "default_image";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    pub unit: ActivityUnit,
    pub group: String,
    #[serde(default)]
    pub asset_key: Option<String>,
}

/// How an activity is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityUnit {
    /// Tracked with a stopwatch, recorded in minutes
    #[serde(alias = "minutes")]
    Duration,
    /// Recorded manually as a whole number
    Count,
}

/// What a running engine is tracking time against.
///
/// Carries everything the presence service needs so the engine never has to
/// look the activity up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityBinding {
    pub activity_id: i64,
    pub activity_name: String,
    pub group: String,
    pub asset_key: String,
    #[serde(default)]
    pub details: String,
}

impl Activity {
    pub fn is_timed(&self) -> bool {
        self.unit == ActivityUnit::Duration
    }

    pub fn asset_key_or_default(&self) -> &str {
        self.asset_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(DEFAULT_ASSET_KEY)
    }

    /// Build the binding for this activity with the given presence details.
    pub fn binding(&self, details: impl Into<String>) -> ActivityBinding {
        ActivityBinding {
            activity_id: self.id,
            activity_name: self.name.clone(),
            group: self.group.clone(),
            asset_key: self.asset_key_or_default().to_string(),
            details: details.into(),
        }
    }
}

impl ActivityUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityUnit::Duration => "duration",
            ActivityUnit::Count => "count",
        }
    }
}
