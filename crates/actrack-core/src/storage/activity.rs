//! Read-only activity catalog loaded from `activities.json`

use crate::{models::Activity, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const CATALOG_FILE: &str = "activities.json";

#[derive(Debug, Serialize, Deserialize)]
struct ActivitiesFile {
    activities: Vec<Activity>,
}

pub struct ActivityCatalog {
    activities: Vec<Activity>,
}

impl ActivityCatalog {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self { activities }
    }

    pub fn path(data_dir: &std::path::Path) -> PathBuf {
        data_dir.join(CATALOG_FILE)
    }

    pub fn load(data_dir: PathBuf) -> Result<Self> {
        let catalog_path = Self::path(&data_dir);

        if !catalog_path.exists() {
            return Ok(Self::new(Vec::new()));
        }

        let content = std::fs::read_to_string(catalog_path)?;
        let file: ActivitiesFile = serde_json::from_str(&content)?;
        Ok(Self::new(file.activities))
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn get(&self, id: i64) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Resolve a command-line reference: a numeric id or a case-insensitive name.
    pub fn resolve(&self, reference: &str) -> Result<&Activity> {
        let found = match reference.trim().parse::<i64>() {
            Ok(id) => self.get(id),
            Err(_) => self
                .activities
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(reference.trim())),
        };
        found.ok_or_else(|| Error::NotFound(format!("Activity '{}'", reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityUnit;
    use tempfile::TempDir;

    #[test]
    fn test_missing_catalog_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = ActivityCatalog::load(dir.path().to_path_buf()).unwrap();
        assert!(catalog.activities().is_empty());
        assert!(catalog.resolve("1").is_err());
    }

    #[test]
    fn test_resolve_by_id_and_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CATALOG_FILE),
            r#"{"activities": [
                {"id": 1, "name": "Reading", "unit": "minutes", "group": "study", "asset_key": "book"},
                {"id": 2, "name": "Pushups", "unit": "count", "group": "fitness"}
            ]}"#,
        )
        .unwrap();

        let catalog = ActivityCatalog::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(catalog.resolve("1").unwrap().name, "Reading");
        assert_eq!(catalog.resolve("pushups").unwrap().id, 2);
        assert_eq!(catalog.resolve("2").unwrap().unit, ActivityUnit::Count);
        assert!(matches!(catalog.resolve("Nap"), Err(Error::NotFound(_))));
    }
}
