//! Room document store adapter.
//!
//! [`RoomStore`] is the only component that talks to the remote key-value
//! store. It speaks to a narrow [`RoomBackend`] over raw JSON and runs every
//! read through [`sanitize_room`], so callers only ever see well-typed
//! [`Room`]s. Race-prone read-modify-write cycles go through
//! [`RoomStore::transact`], an optimistic compare-and-apply loop keyed on
//! the backend's document versions.

mod firebase;
mod memory;

pub use firebase::FirebaseBackend;
pub use memory::MemoryBackend;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tictactoe_rules::InvariantSet;
use tracing::{debug, info, instrument, warn};

use crate::error::{RoomError, RoomErrorKind};
use crate::room::{Room, RoomCode, RoomInvariants, RoomPatch, sanitize_room};

/// Opaque version token of a stored document.
///
/// Absent documents have a version too, so "create only if still absent"
/// is an ordinary conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Wraps a backend-specific token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A value together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    /// The value (`Value::Null` for an absent document).
    pub data: T,
    /// Version the value was read at.
    pub version: Version,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed; the document now has this version.
    Applied(Version),
    /// Someone else wrote first; nothing was written.
    Conflict,
}

/// Raw document operations against a remote collection of rooms.
///
/// Keys are room codes. Implementations must make
/// [`put_if_version`](RoomBackend::put_if_version) atomic with respect to
/// every other write on the same key.
#[async_trait]
pub trait RoomBackend: Send + Sync + fmt::Debug {
    /// Reads one document; `Value::Null` if absent.
    async fn fetch(&self, key: &str) -> Result<Versioned<Value>, RoomError>;

    /// Reads the whole collection, keyed by document key.
    async fn fetch_all(&self) -> Result<Map<String, Value>, RoomError>;

    /// Unconditionally overwrites a document.
    async fn put(&self, key: &str, document: Value) -> Result<(), RoomError>;

    /// Overwrites a document only if it is still at `expected`.
    async fn put_if_version(
        &self,
        key: &str,
        document: Value,
        expected: &Version,
    ) -> Result<CasOutcome, RoomError>;

    /// Merges the given fields into a document, leaving others untouched.
    async fn patch(&self, key: &str, fields: Map<String, Value>) -> Result<(), RoomError>;

    /// Removes a document. Removing an absent document succeeds.
    async fn delete(&self, key: &str) -> Result<(), RoomError>;
}

/// Default number of attempts for [`RoomStore::transact`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// Typed room operations over a [`RoomBackend`].
#[derive(Debug, Clone)]
pub struct RoomStore {
    backend: Arc<dyn RoomBackend>,
    max_attempts: u32,
}

impl RoomStore {
    /// Creates a store over `backend`, retrying transactions up to
    /// `max_attempts` times (at least once).
    #[instrument(skip(backend))]
    pub fn new(backend: Arc<dyn RoomBackend>, max_attempts: u32) -> Self {
        info!(backend = ?backend, "Creating RoomStore");
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Store over a fresh in-process backend, returned alongside it.
    pub fn in_memory() -> (Self, MemoryBackend) {
        let backend = MemoryBackend::new();
        (Self::new(Arc::new(backend.clone()), DEFAULT_MAX_ATTEMPTS), backend)
    }

    /// Configured transaction attempt limit.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Reads and sanitizes a room.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::RoomNotFound`] if the document is absent or has no
    /// creator; [`RoomErrorKind::StoreUnavailable`] on transport failure.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn get(&self, code: &RoomCode) -> Result<Room, RoomError> {
        let raw = self.backend.fetch(code.as_str()).await?;
        debug!(version = %raw.version, "Fetched room document");
        read_room(code, &raw.data)
    }

    /// Like [`get`](Self::get), but an absent room is `Ok(None)`.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn try_get(&self, code: &RoomCode) -> Result<Option<Room>, RoomError> {
        match self.get(code).await {
            Ok(room) => Ok(Some(room)),
            Err(e) if matches!(e.kind(), RoomErrorKind::RoomNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Overwrites the whole document with `room`.
    #[instrument(skip(self, room), fields(code = %room.code, status = %room.status))]
    pub async fn set(&self, room: &Room) -> Result<(), RoomError> {
        self.backend.put(room.code.as_str(), room.to_document()).await?;
        debug!("Room document written");
        Ok(())
    }

    /// Merges only the fields named in `patch`.
    #[instrument(skip(self, patch), fields(code = %code))]
    pub async fn update_fields(&self, code: &RoomCode, patch: &RoomPatch) -> Result<(), RoomError> {
        if patch.is_empty() {
            debug!("Empty patch, nothing to write");
            return Ok(());
        }
        self.backend.patch(code.as_str(), patch.to_fields()).await?;
        debug!(?patch, "Room fields updated");
        Ok(())
    }

    /// Deletes the room document.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn delete(&self, code: &RoomCode) -> Result<(), RoomError> {
        self.backend.delete(code.as_str()).await?;
        info!("Room document deleted");
        Ok(())
    }

    /// Read-modify-write with optimistic concurrency.
    ///
    /// Reads the room, applies `update`, and writes the result only if the
    /// document has not changed since the read. On a conflict the cycle
    /// starts over with a fresh read, so `update` may run several times and
    /// must not have side effects. An `Err` from `update` aborts without
    /// writing and is returned unchanged; an unchanged room is returned
    /// without writing either.
    ///
    /// # Errors
    ///
    /// [`RoomErrorKind::RoomNotFound`] if the room is absent on any attempt,
    /// [`RoomErrorKind::TransactionConflict`] once attempts run out, or
    /// whatever `update` returned.
    #[instrument(skip(self, update), fields(code = %code, max_attempts = self.max_attempts))]
    pub async fn transact<F>(&self, code: &RoomCode, mut update: F) -> Result<Room, RoomError>
    where
        F: FnMut(Room) -> Result<Room, RoomError> + Send,
    {
        for attempt in 1..=self.max_attempts {
            let raw = self.backend.fetch(code.as_str()).await?;
            let current = read_room(code, &raw.data)?;

            let next = update(current.clone())?;
            if next == current {
                debug!(attempt, "Update changed nothing, skipping write");
                return Ok(next);
            }

            match self
                .backend
                .put_if_version(code.as_str(), next.to_document(), &raw.version)
                .await?
            {
                CasOutcome::Applied(version) => {
                    debug!(attempt, %version, "Transaction committed");
                    return Ok(next);
                }
                CasOutcome::Conflict => {
                    warn!(attempt, read_version = %raw.version, "Concurrent write detected, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!("Transaction attempts exhausted");
        Err(RoomError::new(RoomErrorKind::TransactionConflict {
            code: code.to_string(),
            attempts: self.max_attempts,
        }))
    }

    /// Snapshot of every public room, sorted by code.
    ///
    /// Documents under malformed keys or without a creator are skipped.
    #[instrument(skip(self))]
    pub async fn list_public(&self) -> Result<Vec<Room>, RoomError> {
        let documents = self.backend.fetch_all().await?;
        let total = documents.len();

        let mut rooms: Vec<Room> = documents
            .iter()
            .filter_map(|(key, raw)| match RoomCode::parse(key) {
                Ok(code) if code.as_str() == key => read_room(&code, raw).ok(),
                _ => {
                    debug!(key = %key, "Skipping document under malformed key");
                    None
                }
            })
            .filter(|room| room.is_public)
            .collect();
        rooms.sort_by(|a, b| a.code.cmp(&b.code));

        info!(total, public = rooms.len(), "Listed public rooms");
        Ok(rooms)
    }
}

/// Sanitizes a raw document, logging any broken room invariant.
fn read_room(code: &RoomCode, raw: &Value) -> Result<Room, RoomError> {
    let room = sanitize_room(code, raw).ok_or_else(|| RoomError::not_found(code.as_str()))?;
    if let Err(violations) = RoomInvariants::check_all(&room) {
        let described: Vec<String> = violations.iter().map(ToString::to_string).collect();
        warn!(code = %code, ?described, "Stored room breaks invariants");
    }
    Ok(room)
}
