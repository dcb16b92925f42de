//! In-memory record store with an optional JSON snapshot on disk.
//!
//! Records are keyed by `(municipality, assessment_number)`. An upsert
//! replaces every field of the stored record except the coordinates,
//! which are kept when the incoming record has none.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tax_sale_property_models::{PropertyRecord, RecordStatus};
use tokio::sync::Mutex;

use crate::adapters::{PersistenceAdapter, PersistenceError};

type Key = (String, String);

/// A [`PersistenceAdapter`] holding records in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<BTreeMap<Key, PropertyRecord>>,
    snapshot: Option<PathBuf>,
}

fn key(municipality: &str, assessment_number: &str) -> Key {
    (municipality.to_owned(), assessment_number.to_owned())
}

impl InMemoryStore {
    /// Creates an empty store with no snapshot file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store backed by `path`, loading the snapshot if the file
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the file exists but cannot be read
    /// or parsed.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let records = if path.exists() {
            let bytes = std::fs::read(path).map_err(|source| PersistenceError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let list: Vec<PropertyRecord> = serde_json::from_slice(&bytes)?;
            log::info!("Loaded {} records from {}", list.len(), path.display());
            list.into_iter()
                .map(|r| (key(&r.municipality, &r.assessment_number), r))
                .collect()
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            records: Mutex::new(records),
            snapshot: Some(path.to_path_buf()),
        })
    }

    /// Writes every record to the snapshot file, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if serialization or the write fails.
    pub async fn save(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let records = self.records.lock().await;
        let list: Vec<&PropertyRecord> = records.values().collect();
        let json = serde_json::to_vec_pretty(&list)?;
        std::fs::write(path, json).map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Saved {} records to {}", list.len(), path.display());
        Ok(())
    }

    /// Every record of a municipality, active or not.
    pub async fn records(&self, municipality: &str) -> Vec<PropertyRecord> {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| r.municipality == municipality)
            .cloned()
            .collect()
    }

    /// One record.
    pub async fn get(&self, municipality: &str, assessment_number: &str) -> Option<PropertyRecord> {
        self.records
            .lock()
            .await
            .get(&key(municipality, assessment_number))
            .cloned()
    }
}

#[async_trait::async_trait]
impl PersistenceAdapter for InMemoryStore {
    async fn upsert(&self, mut record: PropertyRecord) -> Result<bool, PersistenceError> {
        let mut records = self.records.lock().await;
        let k = key(&record.municipality, &record.assessment_number);

        if let Some(existing) = records.get(&k) {
            if record.coordinates().is_none() {
                record.latitude = existing.latitude;
                record.longitude = existing.longitude;
            }
            if existing.status == record.status {
                record.status_updated_at = existing.status_updated_at;
            }
            if *existing == record {
                return Ok(false);
            }
        }

        records.insert(k, record);
        Ok(true)
    }

    async fn list_active_assessment_numbers(
        &self,
        municipality: &str,
    ) -> Result<BTreeSet<String>, PersistenceError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.municipality == municipality && r.is_active())
            .map(|r| r.assessment_number.clone())
            .collect())
    }

    async fn list_active(&self, municipality: &str) -> Result<Vec<PropertyRecord>, PersistenceError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.municipality == municipality && r.is_active())
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        municipality: &str,
        assessment_number: &str,
        status: RecordStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&key(municipality, assessment_number))
            .ok_or_else(|| PersistenceError::NotFound {
                municipality: municipality.to_owned(),
                assessment_number: assessment_number.to_owned(),
            })?;
        Ok(record.set_status(status, at))
    }

    async fn coordinates(
        &self,
        municipality: &str,
        assessment_number: &str,
    ) -> Result<Option<(f64, f64)>, PersistenceError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&key(municipality, assessment_number))
            .and_then(PropertyRecord::coordinates))
    }
}
