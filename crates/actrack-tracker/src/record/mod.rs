//! Record sinks: where finished runs and manual counts end up

pub mod pending;

pub use pending::PendingRecords;

use actrack_core::models::{NewRecord, Record, RecordValue};
use actrack_core::storage::RecordStorage;
use actrack_core::Clock;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RecordSinkError {
    #[error("Storage error: {0}")]
    Storage(#[from] actrack_core::Error),

    #[error("Record rejected: {0}")]
    Rejected(String),

    #[error("Task join error: {0}")]
    JoinError(String),
}

pub type Result<T> = std::result::Result<T, RecordSinkError>;

/// Accepts finalized values for an activity.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn create_record(&self, record: NewRecord) -> Result<Record>;
}

/// Appends records to `records.csv` in the data directory.
pub struct CsvRecordSink {
    storage: Arc<RecordStorage>,
    clock: Arc<dyn Clock>,
}

impl CsvRecordSink {
    pub fn new(data_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: Arc::new(RecordStorage::new(data_dir)),
            clock,
        }
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        Ok(self.storage.load()?)
    }

    /// Presence details for an activity, e.g. "Today 30 min / Total 2.0 h".
    /// Unreadable history yields empty details rather than an error.
    pub fn details_for(&self, activity_id: i64) -> String {
        match self.storage.summary(activity_id, self.clock.now()) {
            Ok(summary) => summary.describe(),
            Err(e) => {
                tracing::warn!("Failed to summarize records for {}: {}", activity_id, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl RecordSink for CsvRecordSink {
    async fn create_record(&self, record: NewRecord) -> Result<Record> {
        validate(&record)?;

        let record = record.into_record(self.clock.now());
        let storage = self.storage.clone();
        let stored = record.clone();
        tokio::task::spawn_blocking(move || storage.append(&stored))
            .await
            .map_err(|e| RecordSinkError::JoinError(e.to_string()))??;

        tracing::info!(
            activity_id = record.activity_id,
            value = record.value.as_f64(),
            "Record saved"
        );
        Ok(record)
    }
}

fn validate(record: &NewRecord) -> Result<()> {
    match record.value {
        RecordValue::Minutes(m) if !m.is_finite() || m < 0.0 => Err(RecordSinkError::Rejected(
            format!("invalid minute value {}", m),
        )),
        RecordValue::Count(c) if c < 0 => Err(RecordSinkError::Rejected(format!(
            "negative count {}",
            c
        ))),
        _ => Ok(()),
    }
}
