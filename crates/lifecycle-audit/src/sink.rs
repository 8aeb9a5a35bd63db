//! Fire-and-forget submission of history backups
//!
//! The state machine only sees [`AuditSink`]. Submitting never fails and
//! never rolls anything back; failures are logged where the write happens.

use crate::error::{AuditError, AuditResult};
use crate::trail::AuditTrail;
use lifecycle_model::{EntityId, PhaseTransition};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receives a full history after every applied transition
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    /// Hand off `history` for backup; must not block or fail the caller
    fn submit(&self, entity_id: EntityId, history: Vec<PhaseTransition>);
}

impl AuditSink for AuditTrail {
    fn submit(&self, entity_id: EntityId, history: Vec<PhaseTransition>) {
        if let Err(e) = self.backup(entity_id, &history) {
            tracing::warn!(entity = %entity_id, error = %e, "history backup failed");
        }
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn submit(&self, _entity_id: EntityId, _history: Vec<PhaseTransition>) {}
}

/// Counts reported by [`BackgroundAuditWriter::shutdown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: usize,
    pub failed: usize,
}

struct BackupJob {
    entity_id: EntityId,
    history: Vec<PhaseTransition>,
}

/// Sink that queues backups for a worker on tokio's blocking pool
///
/// `submit` only pushes onto an unbounded channel. Call
/// [`shutdown`](Self::shutdown) before exit to drain the queue.
#[derive(Debug)]
pub struct BackgroundAuditWriter {
    sender: Mutex<Option<mpsc::UnboundedSender<BackupJob>>>,
    worker: Mutex<Option<JoinHandle<WriterStats>>>,
}

impl BackgroundAuditWriter {
    /// Start the worker; must be called within a tokio runtime
    #[must_use]
    pub fn spawn(trail: AuditTrail) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BackupJob>();
        let worker = tokio::task::spawn_blocking(move || {
            let mut stats = WriterStats::default();
            while let Some(job) = rx.blocking_recv() {
                match trail.backup(job.entity_id, &job.history) {
                    Ok(_) => stats.written += 1,
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(entity = %job.entity_id, error = %e, "history backup failed");
                    }
                }
            }
            stats
        });
        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Whether the writer still accepts submissions
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stop accepting work, wait for queued backups, and report counts
    ///
    /// Calling it again returns zeroed stats.
    ///
    /// # Errors
    /// Returns error if the worker panicked
    pub async fn shutdown(&self) -> AuditResult<WriterStats> {
        // Dropping the sender ends the worker loop once the queue is empty
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return Ok(WriterStats::default());
        };
        let stats = worker
            .await
            .map_err(|e| AuditError::Worker(e.to_string()))?;
        tracing::debug!(written = stats.written, failed = stats.failed, "audit writer drained");
        Ok(stats)
    }
}

impl AuditSink for BackgroundAuditWriter {
    fn submit(&self, entity_id: EntityId, history: Vec<PhaseTransition>) {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            tracing::warn!(entity = %entity_id, "audit writer is shut down, backup dropped");
            return;
        };
        if sender.send(BackupJob { entity_id, history }).is_err() {
            tracing::warn!(entity = %entity_id, "audit writer stopped, backup dropped");
        }
    }
}
