//! Finalized activity records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of a record: fractional minutes for timed activities, a whole
/// number for count activities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "unit", content = "value", rename_all = "lowercase")]
pub enum RecordValue {
    Minutes(f64),
    Count(i64),
}

/// A record waiting to be submitted to a sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRecord {
    pub activity_id: i64,
    pub value: RecordValue,
    #[serde(default)]
    pub memo: Option<String>,
}

/// A record as stored by a sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub activity_id: i64,
    pub value: RecordValue,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RecordValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            RecordValue::Minutes(m) => *m,
            RecordValue::Count(c) => *c as f64,
        }
    }

    pub fn minutes(&self) -> Option<f64> {
        match self {
            RecordValue::Minutes(m) => Some(*m),
            RecordValue::Count(_) => None,
        }
    }
}

impl NewRecord {
    pub fn minutes(activity_id: i64, minutes: f64, memo: Option<String>) -> Self {
        Self {
            activity_id,
            value: RecordValue::Minutes(minutes),
            memo: normalize_memo(memo),
        }
    }

    pub fn count(activity_id: i64, count: i64, memo: Option<String>) -> Self {
        Self {
            activity_id,
            value: RecordValue::Count(count),
            memo: normalize_memo(memo),
        }
    }

    /// Stamp the record with an id and creation time.
    pub fn into_record(self, created_at: DateTime<Utc>) -> Record {
        Record {
            id: Uuid::new_v4().to_string(),
            activity_id: self.activity_id,
            value: self.value,
            memo: self.memo,
            created_at,
        }
    }
}

fn normalize_memo(memo: Option<String>) -> Option<String> {
    memo.filter(|m| !m.trim().is_empty())
}
