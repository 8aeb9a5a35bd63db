//! Keyed blob storage for audit records
//!
//! Backends store opaque bytes; interpreting and verifying them is the job of
//! [`crate::AuditTrail`]. Each `put` replaces the previous blob for that entity.

use crate::error::{AuditError, AuditResult};
use dashmap::DashMap;
use lifecycle_model::EntityId;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Side-channel store for serialized audit records
pub trait AuditBackend: Send + Sync + std::fmt::Debug {
    /// Store `bytes` for `id`, replacing any previous record
    ///
    /// # Errors
    /// Returns error if the medium rejects the write
    fn put(&self, id: EntityId, bytes: &[u8]) -> AuditResult<()>;

    /// Fetch the stored bytes for `id`
    ///
    /// # Errors
    /// Returns error if the medium cannot be read
    fn get(&self, id: EntityId) -> AuditResult<Option<Vec<u8>>>;

    /// Delete the record for `id`, returning whether one existed
    ///
    /// # Errors
    /// Returns error if the medium rejects the delete
    fn remove(&self, id: EntityId) -> AuditResult<bool>;
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryAuditBackend {
    records: DashMap<EntityId, Vec<u8>>,
}

impl MemoryAuditBackend {
    /// Create empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AuditBackend for MemoryAuditBackend {
    fn put(&self, id: EntityId, bytes: &[u8]) -> AuditResult<()> {
        self.records.insert(id, bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: EntityId) -> AuditResult<Option<Vec<u8>>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    fn remove(&self, id: EntityId) -> AuditResult<bool> {
        Ok(self.records.remove(&id).is_some())
    }
}

/// One `<id>.json` file per entity under a directory
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash mid-write never leaves a truncated record.
#[derive(Debug, Clone)]
pub struct FileAuditBackend {
    dir: PathBuf,
}

impl FileAuditBackend {
    /// Open (creating if needed) a backend rooted at `dir`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> AuditResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| AuditError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the record for `id`
    #[must_use]
    pub fn record_path(&self, id: EntityId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl AuditBackend for FileAuditBackend {
    fn put(&self, id: EntityId, bytes: &[u8]) -> AuditResult<()> {
        let target = self.record_path(id);
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| AuditError::io(&self.dir, e))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| AuditError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| AuditError::io(&target, e.error))?;
        Ok(())
    }

    fn get(&self, id: EntityId) -> AuditResult<Option<Vec<u8>>> {
        let path = self.record_path(id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuditError::io(path, e)),
        }
    }

    fn remove(&self, id: EntityId) -> AuditResult<bool> {
        let path = self.record_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuditError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &dyn AuditBackend) {
        let id = EntityId::new();
        assert_eq!(backend.get(id).unwrap(), None);

        backend.put(id, b"first").unwrap();
        backend.put(id, b"second").unwrap();
        assert_eq!(backend.get(id).unwrap().as_deref(), Some(&b"second"[..]));

        assert!(backend.remove(id).unwrap());
        assert!(!backend.remove(id).unwrap());
        assert_eq!(backend.get(id).unwrap(), None);
    }

    #[test]
    fn memory_backend_overwrites() {
        let backend = MemoryAuditBackend::new();
        exercise(&backend);
        assert!(backend.is_empty());
    }

    #[test]
    fn file_backend_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileAuditBackend::open(dir.path().join("audit")).unwrap();
        exercise(&backend);
    }

    #[test]
    fn file_backend_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileAuditBackend::open(dir.path()).unwrap();
        let id = EntityId::new();
        backend.put(id, b"{}").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{id}.json")]);
    }
}
