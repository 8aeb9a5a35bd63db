//! Short-lived memoization of transition checks
//!
//! Entries expire by TTL only; nothing invalidates them explicitly. Status is
//! part of the key, so a status change is seen immediately. Payload edits
//! (spec completion, task states) may lag by up to one TTL. With a single
//! writer per entity and a TTL around one second this staleness is accepted.

use crate::check::TransitionCheck;
use lifecycle_model::{EntityId, Phase, Status};
use moka::sync::Cache;
use std::time::Duration;

/// Cache key: the inputs a check depends on besides the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidationKey {
    pub entity_id: EntityId,
    pub phase: Phase,
    pub target: Phase,
    pub status: Status,
}

/// Memo store for [`TransitionCheck`]s
pub trait ValidationCache: Send + Sync + std::fmt::Debug {
    /// Cached check, if still fresh
    fn get(&self, key: &ValidationKey) -> Option<TransitionCheck>;

    /// Remember `check` for `key`
    fn insert(&self, key: ValidationKey, check: TransitionCheck);

    /// Drop every entry
    fn clear(&self);
}

/// TTL cache backed by moka
#[derive(Debug, Clone)]
pub struct MokaValidationCache {
    inner: Cache<ValidationKey, TransitionCheck>,
}

impl MokaValidationCache {
    /// Default time-to-live
    pub const DEFAULT_TTL: Duration = Duration::from_secs(1);

    /// Create cache with capacity and time-to-live
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Approximate number of live entries
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for MokaValidationCache {
    fn default() -> Self {
        Self::with_ttl(1_024, Self::DEFAULT_TTL)
    }
}

impl ValidationCache for MokaValidationCache {
    fn get(&self, key: &ValidationKey) -> Option<TransitionCheck> {
        self.inner.get(key)
    }

    fn insert(&self, key: ValidationKey, check: TransitionCheck) {
        self.inner.insert(key, check);
    }

    fn clear(&self) {
        self.inner.invalidate_all();
    }
}

/// Cache that never remembers anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidationCache;

impl ValidationCache for NoopValidationCache {
    fn get(&self, _key: &ValidationKey) -> Option<TransitionCheck> {
        None
    }

    fn insert(&self, _key: ValidationKey, _check: TransitionCheck) {}

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(status: Status) -> ValidationKey {
        ValidationKey {
            entity_id: EntityId::new(),
            phase: Phase::Discovery,
            target: Phase::ImplementationSpec,
            status,
        }
    }

    #[test]
    fn hit_within_ttl() {
        let cache = MokaValidationCache::default();
        let k = key(Status::ClientApproved);
        cache.insert(k, TransitionCheck::allow(100));
        assert_eq!(cache.get(&k), Some(TransitionCheck::allow(100)));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn status_is_part_of_key() {
        let cache = MokaValidationCache::default();
        let approved = key(Status::ClientApproved);
        let pending = ValidationKey {
            status: Status::AwaitingClientDecision,
            ..approved
        };
        cache.insert(approved, TransitionCheck::allow(100));
        assert_eq!(cache.get(&pending), None);
    }

    #[test]
    fn entries_expire() {
        let cache = MokaValidationCache::with_ttl(16, Duration::from_millis(30));
        let k = key(Status::DiscoveryComplete);
        cache.insert(k, TransitionCheck::allow(50));
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get(&k), None);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = MokaValidationCache::default();
        let k = key(Status::ClientApproved);
        cache.insert(k, TransitionCheck::allow(100));
        cache.clear();
        assert_eq!(cache.get(&k), None);
    }

    #[test]
    fn noop_never_hits() {
        let k = key(Status::ClientApproved);
        NoopValidationCache.insert(k, TransitionCheck::allow(100));
        assert_eq!(NoopValidationCache.get(&k), None);
    }
}
