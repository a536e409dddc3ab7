//! Per-envelope mutual exclusion.
//!
//! Transitions on one envelope run one at a time; different envelopes never
//! contend. The repository's version check still guards every write.

use dashmap::DashMap;
use envelope_types::EnvelopeId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct EnvelopeLocks {
    locks: DashMap<EnvelopeId, Arc<Mutex<()>>>,
}

impl EnvelopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: EnvelopeId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
