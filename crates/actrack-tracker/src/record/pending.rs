//! Records that could not be submitted, kept until a retry succeeds

use actrack_core::models::NewRecord;
use actrack_core::storage::KeyValueStore;
use actrack_core::Result;
use std::sync::Arc;

const PENDING_KEY: &str = "pending_records";

pub struct PendingRecords {
    store: Arc<dyn KeyValueStore>,
}

impl PendingRecords {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Vec<NewRecord>> {
        match self.store.get(PENDING_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn push(&self, record: NewRecord) -> Result<()> {
        let mut pending = self.load()?;
        pending.push(record);
        self.replace(&pending)
    }

    pub fn replace(&self, pending: &[NewRecord]) -> Result<()> {
        if pending.is_empty() {
            return self.store.delete(PENDING_KEY);
        }
        self.store.set(PENDING_KEY, &serde_json::to_string(pending)?)
    }
}
