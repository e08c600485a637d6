//! In-process backend with the same versioning semantics as the remote
//! store. Used by tests and for single-process play.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::RoomError;
use crate::store::{CasOutcome, RoomBackend, Version, Versioned};

const ABSENT: &str = "absent";

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<String, (Value, u64)>,
    last_version: u64,
    unavailable: bool,
}

impl MemoryState {
    fn version_of(&self, key: &str) -> Version {
        match self.documents.get(key) {
            Some((_, version)) => Version::new(version.to_string()),
            None => Version::new(ABSENT),
        }
    }

    fn write(&mut self, key: &str, document: Value) -> Version {
        if document.is_null() {
            self.documents.remove(key);
            return Version::new(ABSENT);
        }
        self.last_version += 1;
        self.documents
            .insert(key.to_string(), (document, self.last_version));
        Version::new(self.last_version.to_string())
    }
}

/// Shared in-memory document map. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[instrument]
    pub fn new() -> Self {
        debug!("Creating MemoryBackend");
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RoomError> {
        self.state
            .lock()
            .map_err(|_| RoomError::unavailable("memory store lock poisoned"))
    }

    fn available(&self) -> Result<MutexGuard<'_, MemoryState>, RoomError> {
        let state = self.state()?;
        if state.unavailable {
            return Err(RoomError::unavailable("memory store is offline"));
        }
        Ok(state)
    }

    /// Stores an arbitrary document, bypassing any typing.
    pub fn insert_raw(&self, key: &str, document: Value) -> Result<(), RoomError> {
        self.state()?.write(key, document);
        Ok(())
    }

    /// Returns the stored document as-is.
    pub fn raw(&self, key: &str) -> Result<Option<Value>, RoomError> {
        Ok(self.state()?.documents.get(key).map(|(doc, _)| doc.clone()))
    }

    /// Makes every subsequent operation fail with `StoreUnavailable` until
    /// switched back.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), RoomError> {
        self.state()?.unavailable = unavailable;
        Ok(())
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<usize, RoomError> {
        Ok(self.state()?.documents.len())
    }

    /// True if no documents are stored.
    pub fn is_empty(&self) -> Result<bool, RoomError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl RoomBackend for MemoryBackend {
    async fn fetch(&self, key: &str) -> Result<Versioned<Value>, RoomError> {
        let state = self.available()?;
        let data = state
            .documents
            .get(key)
            .map(|(doc, _)| doc.clone())
            .unwrap_or(Value::Null);
        Ok(Versioned {
            data,
            version: state.version_of(key),
        })
    }

    async fn fetch_all(&self) -> Result<Map<String, Value>, RoomError> {
        let state = self.available()?;
        Ok(state
            .documents
            .iter()
            .map(|(key, (doc, _))| (key.clone(), doc.clone()))
            .collect())
    }

    async fn put(&self, key: &str, document: Value) -> Result<(), RoomError> {
        self.available()?.write(key, document);
        Ok(())
    }

    async fn put_if_version(
        &self,
        key: &str,
        document: Value,
        expected: &Version,
    ) -> Result<CasOutcome, RoomError> {
        let mut state = self.available()?;
        if state.version_of(key) != *expected {
            return Ok(CasOutcome::Conflict);
        }
        Ok(CasOutcome::Applied(state.write(key, document)))
    }

    async fn patch(&self, key: &str, fields: Map<String, Value>) -> Result<(), RoomError> {
        let mut state = self.available()?;
        let mut merged = match state.documents.get(key) {
            Some((Value::Object(existing), _)) => existing.clone(),
            _ => Map::new(),
        };
        merged.extend(fields);
        state.write(key, Value::Object(merged));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RoomError> {
        self.available()?.documents.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_conditional_write_detects_conflict() {
        let backend = MemoryBackend::new();
        let read = backend.fetch("AB3D").await.unwrap();
        assert!(read.data.is_null());

        let first = backend
            .put_if_version("AB3D", json!({"n": 1}), &read.version)
            .await
            .unwrap();
        assert!(matches!(first, CasOutcome::Applied(_)));

        let second = backend
            .put_if_version("AB3D", json!({"n": 2}), &read.version)
            .await
            .unwrap();
        assert_eq!(second, CasOutcome::Conflict);
        assert_eq!(backend.raw("AB3D").unwrap(), Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_patch_merges_and_bumps_version() {
        let backend = MemoryBackend::new();
        backend.put("AB3D", json!({"a": 1, "b": 2})).await.unwrap();
        let before = backend.fetch("AB3D").await.unwrap().version;

        let mut fields = Map::new();
        fields.insert("b".into(), json!(3));
        backend.patch("AB3D", fields).await.unwrap();

        let after = backend.fetch("AB3D").await.unwrap();
        assert_eq!(after.data, json!({"a": 1, "b": 3}));
        assert_ne!(after.version, before);
    }

    #[tokio::test]
    async fn test_offline_fails_every_operation() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true).unwrap();
        assert!(backend.fetch("AB3D").await.unwrap_err().is_transient());
        assert!(backend.put("AB3D", json!({})).await.is_err());
        backend.set_unavailable(false).unwrap();
        assert!(backend.fetch("AB3D").await.is_ok());
    }
}
