//! Persistence collaborator
//!
//! Stores hold raw JSON documents. They know nothing about schema versions;
//! everything they return goes through migration before it is decoded.

use crate::error::{StoreError, StoreResult};
use dashmap::DashMap;
use lifecycle_model::EntityId;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keyed document storage
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Raw document for `id`, or `None` if not stored
    ///
    /// # Errors
    /// Returns error if the medium cannot be read or holds invalid JSON
    fn load(&self, id: EntityId) -> StoreResult<Option<Value>>;

    /// Store `document` under `id`, replacing any previous version
    ///
    /// # Errors
    /// Returns error if the medium rejects the write
    fn save(&self, id: EntityId, document: &Value) -> StoreResult<()>;

    /// Every stored id, sorted
    ///
    /// # Errors
    /// Returns error if the medium cannot be listed
    fn ids(&self) -> StoreResult<Vec<EntityId>>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<EntityId, Value>,
}

impl MemoryDocumentStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw document directly, bypassing any entity encoding
    pub fn insert_raw(&self, id: EntityId, document: Value) {
        self.documents.insert(id, document);
    }

    /// Number of stored documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&self, id: EntityId) -> StoreResult<Option<Value>> {
        Ok(self.documents.get(&id).map(|d| d.value().clone()))
    }

    fn save(&self, id: EntityId, document: &Value) -> StoreResult<()> {
        self.documents.insert(id, document.clone());
        Ok(())
    }

    fn ids(&self) -> StoreResult<Vec<EntityId>> {
        let mut ids: Vec<EntityId> = self.documents.iter().map(|d| *d.key()).collect();
        ids.sort();
        Ok(ids)
    }
}

/// One pretty-printed `<id>.json` file per entity
///
/// Files whose stem is not an entity id, and subdirectories, are ignored by
/// [`DocumentStore::ids`].
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Open (creating if needed) a store rooted at `dir`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the document for `id`
    #[must_use]
    pub fn document_path(&self, id: EntityId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl DocumentStore for FileDocumentStore {
    fn load(&self, id: EntityId) -> StoreResult<Option<Value>> {
        let path = self.document_path(id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Malformed { id, source })
    }

    fn save(&self, id: EntityId, document: &Value) -> StoreResult<()> {
        let target = self.document_path(id);
        let bytes = serde_json::to_vec_pretty(document)?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| StoreError::io(&target, e.error))?;
        Ok(())
    }

    fn ids(&self) -> StoreResult<Vec<EntityId>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).map(str::parse::<EntityId>) {
                Some(Ok(id)) => ids.push(id),
                _ => tracing::debug!(path = %path.display(), "skipping non-entity file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
