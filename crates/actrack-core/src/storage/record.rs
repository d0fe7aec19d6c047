//! Activity record storage operations (CSV format)

use crate::{
    models::{Record, RecordValue},
    Result,
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const RECORDS_FILE: &str = "records.csv";

/// CSV-friendly representation of a Record
#[derive(Debug, Serialize, Deserialize)]
struct RecordCsv {
    id: String,
    activity_id: i64,
    unit: String,
    value: f64,
    memo: String,
    created_at: String,
}

impl From<&Record> for RecordCsv {
    fn from(record: &Record) -> Self {
        let (unit, value) = match record.value {
            RecordValue::Minutes(m) => ("minutes", m),
            RecordValue::Count(c) => ("count", c as f64),
        };
        Self {
            id: record.id.clone(),
            activity_id: record.activity_id,
            unit: unit.to_string(),
            value,
            memo: record.memo.clone().unwrap_or_default(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

impl TryFrom<RecordCsv> for Record {
    type Error = crate::Error;

    fn try_from(csv: RecordCsv) -> Result<Self> {
        let value = match csv.unit.as_str() {
            "minutes" => RecordValue::Minutes(csv.value),
            "count" => RecordValue::Count(csv.value.round() as i64),
            other => {
                return Err(crate::Error::InvalidData(format!(
                    "Unknown record unit: {}",
                    other
                )))
            }
        };

        Ok(Self {
            id: csv.id,
            activity_id: csv.activity_id,
            value,
            memo: if csv.memo.is_empty() {
                None
            } else {
                Some(csv.memo)
            },
            created_at: DateTime::parse_from_rfc3339(&csv.created_at)
                .map_err(|e| crate::Error::InvalidData(format!("Invalid created_at: {}", e)))?
                .with_timezone(&Utc),
        })
    }
}

/// Per-activity totals used as presence details.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActivitySummary {
    pub today_minutes: f64,
    pub total_minutes: f64,
}

impl ActivitySummary {
    pub fn describe(&self) -> String {
        format!(
            "Today {:.0} min / Total {:.1} h",
            self.today_minutes,
            self.total_minutes / 60.0
        )
    }
}

pub struct RecordStorage {
    data_dir: PathBuf,
}

impl RecordStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn records_path(&self) -> PathBuf {
        self.data_dir.join(RECORDS_FILE)
    }

    pub fn load(&self) -> Result<Vec<Record>> {
        let records_path = self.records_path();

        if !records_path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(records_path)?;
        let mut records = Vec::new();

        for result in reader.deserialize() {
            let record_csv: RecordCsv = result?;
            records.push(Record::try_from(record_csv)?);
        }

        Ok(records)
    }

    pub fn append(&self, record: &Record) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;

        let records_path = self.records_path();
        let file_exists = records_path.exists();

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&records_path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !file_exists {
            writer.write_record(["id", "activity_id", "unit", "value", "memo", "created_at"])?;
        }

        writer.serialize(RecordCsv::from(record))?;
        writer.flush()?;

        Ok(())
    }

    /// Minutes logged for `activity_id` on the local day of `now`, and overall.
    pub fn summary(&self, activity_id: i64, now: DateTime<Utc>) -> Result<ActivitySummary> {
        let today = now.with_timezone(&Local).date_naive();
        let mut summary = ActivitySummary::default();

        for record in self.load()? {
            if record.activity_id != activity_id {
                continue;
            }
            let Some(minutes) = record.value.minutes() else {
                continue;
            };
            summary.total_minutes += minutes;
            if record.created_at.with_timezone(&Local).date_naive() == today {
                summary.today_minutes += minutes;
            }
        }

        Ok(summary)
    }
}
