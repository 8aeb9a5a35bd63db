//! Checksummed backup and restore of phase histories

use crate::backend::AuditBackend;
use crate::error::AuditResult;
use chrono::{DateTime, Utc};
use lifecycle_model::{Checksum, EntityId, PhaseTransition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Digest of a history in canonical form
///
/// The history is hashed as a JSON value tree rather than through its typed
/// encoding, so stored bytes the typed decoder would ignore (unknown or
/// renamed keys) still change the digest.
fn digest(history: &Value) -> AuditResult<Checksum> {
    Ok(Checksum::compute_serializable(history)?)
}

/// Persisted backup of one entity's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub entity_id: EntityId,
    pub history: Vec<PhaseTransition>,
    /// When the backup was taken
    pub timestamp: DateTime<Utc>,
    /// Digest of the serialized `history`
    pub checksum: Checksum,
}

impl AuditRecord {
    /// Build a record for `history`, computing its checksum
    ///
    /// # Errors
    /// Returns error if the history cannot be serialized
    pub fn new(entity_id: EntityId, history: Vec<PhaseTransition>) -> AuditResult<Self> {
        let checksum = digest(&serde_json::to_value(&history)?)?;
        Ok(Self {
            entity_id,
            history,
            timestamp: Utc::now(),
            checksum,
        })
    }

    /// Whether the stored checksum still matches the history
    #[must_use]
    pub fn is_intact(&self) -> bool {
        serde_json::to_value(&self.history)
            .map_err(Into::into)
            .and_then(|v| digest(&v))
            .is_ok_and(|c| c == self.checksum)
    }
}

/// On-disk shape of [`AuditRecord`] with the history left undecoded
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    entity_id: EntityId,
    history: Value,
    timestamp: DateTime<Utc>,
    checksum: Checksum,
}

/// State of an entity's backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupState {
    /// Nothing stored
    Missing,
    /// Record parsed and its checksum matches
    Intact(AuditRecord),
    /// Record exists but cannot be trusted
    Corrupt(String),
}

/// Audit trail over a pluggable [`AuditBackend`]
///
/// Backups overwrite each other (last writer wins); they are recovery aids,
/// not a log.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    backend: Arc<dyn AuditBackend>,
}

impl AuditTrail {
    /// Create trail over `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn AuditBackend>) -> Self {
        Self { backend }
    }

    /// Trail over a fresh in-memory backend
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::backend::MemoryAuditBackend::new()))
    }

    /// Underlying backend
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn AuditBackend> {
        &self.backend
    }

    /// Store a checksummed copy of `history`, replacing any earlier backup
    ///
    /// # Errors
    /// Returns error if encoding or the backend write fails
    pub fn backup(&self, entity_id: EntityId, history: &[PhaseTransition]) -> AuditResult<Checksum> {
        let record = AuditRecord::new(entity_id, history.to_vec())?;
        let bytes = serde_json::to_vec(&record)?;
        self.backend.put(entity_id, &bytes)?;
        tracing::debug!(
            entity = %entity_id,
            entries = history.len(),
            checksum = %record.checksum.short(),
            "history backed up"
        );
        Ok(record.checksum)
    }

    /// Read and verify the backup for `entity_id`
    ///
    /// # Errors
    /// Returns error only if the backend cannot be read
    pub fn inspect(&self, entity_id: EntityId) -> AuditResult<BackupState> {
        let Some(bytes) = self.backend.get(entity_id)? else {
            return Ok(BackupState::Missing);
        };
        let stored: StoredRecord = match serde_json::from_slice(&bytes) {
            Ok(stored) => stored,
            Err(e) => return Ok(BackupState::Corrupt(format!("unreadable record: {e}"))),
        };
        if stored.entity_id != entity_id {
            return Ok(BackupState::Corrupt(format!(
                "record belongs to {}",
                stored.entity_id
            )));
        }
        if digest(&stored.history)? != stored.checksum {
            return Ok(BackupState::Corrupt("checksum mismatch".to_string()));
        }
        let history = match serde_json::from_value(stored.history) {
            Ok(history) => history,
            Err(e) => return Ok(BackupState::Corrupt(format!("unreadable history: {e}"))),
        };
        let record = AuditRecord {
            entity_id,
            history,
            timestamp: stored.timestamp,
            checksum: stored.checksum,
        };
        Ok(BackupState::Intact(record))
    }

    /// Recover the backed-up history for `entity_id`
    ///
    /// Returns `None` when no backup exists or the backup is corrupt; the two
    /// are distinguished in the log.
    ///
    /// # Errors
    /// Returns error only if the backend cannot be read
    pub fn restore(&self, entity_id: EntityId) -> AuditResult<Option<Vec<PhaseTransition>>> {
        match self.inspect(entity_id)? {
            BackupState::Intact(record) => {
                tracing::info!(
                    entity = %entity_id,
                    entries = record.history.len(),
                    "history restored from audit backup"
                );
                Ok(Some(record.history))
            }
            BackupState::Missing => {
                tracing::debug!(entity = %entity_id, "no audit backup");
                Ok(None)
            }
            BackupState::Corrupt(reason) => {
                tracing::warn!(entity = %entity_id, %reason, "audit backup is corrupt, ignoring");
                Ok(None)
            }
        }
    }

    /// Delete the backup for `entity_id`
    ///
    /// # Errors
    /// Returns error if the backend rejects the delete
    pub fn remove(&self, entity_id: EntityId) -> AuditResult<bool> {
        self.backend.remove(entity_id)
    }
}
