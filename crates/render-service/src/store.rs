//! Persistence boundary for compiled collections
//!
//! The store is the single source of truth when the cache misses; the
//! cache is only ever a performance layer on top of it. One record exists
//! per `(project, compile key)` pair, holding either the compiled entries
//! or the compile error that stopped them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use latex_engine::is_landscape;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// One compiled output file within a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfRecord {
    /// Output file name, e.g. `main.pdf`.
    pub name: String,
    pub data_url: String,
    /// First-page media box in points, `[x0, y0, x1, y1]`, when geometry
    /// extraction succeeded.
    pub mediabox: Option<[f64; 4]>,
}

impl PdfRecord {
    /// Landscape output is presented as a slide, portrait as a document.
    pub fn is_slide(&self) -> bool {
        self.mediabox.as_ref().is_some_and(is_landscape)
    }
}

/// Persisted outcome of one compile, either entries or a compile error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub project: String,
    pub key: String,
    pub compile_error: Option<String>,
    pub creation_time: DateTime<Utc>,
    pub entries: Vec<PdfRecord>,
}

impl CollectionRecord {
    pub fn succeeded(
        project: impl Into<String>,
        key: impl Into<String>,
        entries: Vec<PdfRecord>,
    ) -> Self {
        Self {
            project: project.into(),
            key: key.into(),
            compile_error: None,
            creation_time: Utc::now(),
            entries,
        }
    }

    pub fn failed(
        project: impl Into<String>,
        key: impl Into<String>,
        compile_error: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            key: key.into(),
            compile_error: Some(compile_error.into()),
            creation_time: Utc::now(),
            entries: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The `(project, key)` pair is unique; a second create is rejected.
    #[error("a record for ({project}, {key}) already exists")]
    Duplicate { project: String, key: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Record storage. Deleting a record is the store-side half of
/// invalidation; the caller must also invalidate the result cache.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(&self, project: &str, key: &str)
        -> Result<Option<CollectionRecord>, StoreError>;
    async fn create(&self, record: CollectionRecord) -> Result<(), StoreError>;
    /// Returns whether a record existed.
    async fn delete(&self, project: &str, key: &str) -> Result<bool, StoreError>;
}

/// Process-local store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String), CollectionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(
        &self,
        project: &str,
        key: &str,
    ) -> Result<Option<CollectionRecord>, StoreError> {
        let records = self.records.lock().expect("store mutex poisoned");
        Ok(records
            .get(&(project.to_string(), key.to_string()))
            .cloned())
    }

    async fn create(&self, record: CollectionRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("store mutex poisoned");
        let id = (record.project.clone(), record.key.clone());
        if records.contains_key(&id) {
            return Err(StoreError::Duplicate {
                project: id.0,
                key: id.1,
            });
        }
        records.insert(id, record);
        Ok(())
    }

    async fn delete(&self, project: &str, key: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().expect("store mutex poisoned");
        Ok(records
            .remove(&(project.to_string(), key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(key: &str) -> CollectionRecord {
        CollectionRecord::succeeded(
            "proj",
            key,
            vec![PdfRecord {
                name: "main.pdf".to_string(),
                data_url: "data:application/pdf;base64,AAAA".to_string(),
                mediabox: Some([0.0, 0.0, 612.0, 792.0]),
            }],
        )
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let store = MemoryStore::new();
        store.create(record("k1")).await.unwrap();

        let found = store.find("proj", "k1").await.unwrap().unwrap();
        assert_eq!(found.entries.len(), 1);
        assert!(found.compile_error.is_none());
        assert!(store.find("proj", "k2").await.unwrap().is_none());
        assert!(store.find("other", "k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = MemoryStore::new();
        store.create(record("k1")).await.unwrap();
        let err = store.create(record("k1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_record_existed() {
        let store = MemoryStore::new();
        store.create(record("k1")).await.unwrap();
        assert!(store.delete("proj", "k1").await.unwrap());
        assert!(!store.delete("proj", "k1").await.unwrap());
        assert!(store.find("proj", "k1").await.unwrap().is_none());
    }

    #[test]
    fn landscape_entries_are_slides() {
        let mut entry = PdfRecord {
            name: "deck.pdf".to_string(),
            data_url: String::new(),
            mediabox: Some([0.0, 0.0, 800.0, 600.0]),
        };
        assert!(entry.is_slide());

        entry.mediabox = Some([0.0, 0.0, 612.0, 792.0]);
        assert!(!entry.is_slide());

        entry.mediabox = None;
        assert!(!entry.is_slide());
    }
}
