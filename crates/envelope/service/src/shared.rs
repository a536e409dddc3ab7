//! Collaborators shared by the service and its background tasks.

use crate::clock::Clock;
use crate::locks::EnvelopeLocks;
use chrono::{DateTime, Utc};
use envelope_ledger::{AuditAppend, AuditTrail, SignatureStore};
use envelope_store::{DocumentStorage, EnvelopeRepository};
use std::sync::Arc;

pub(crate) struct Shared {
    pub repo: Arc<dyn EnvelopeRepository>,
    pub signatures: Arc<dyn SignatureStore>,
    pub audit: Arc<dyn AuditTrail>,
    pub documents: Arc<dyn DocumentStorage>,
    pub locks: EnvelopeLocks,
    pub clock: Arc<dyn Clock>,
}

impl Shared {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Append to the audit trail. A failure is logged and swallowed: the
    /// transition it describes has already committed.
    pub async fn record_audit(&self, entry: AuditAppend) {
        let envelope_id = entry.envelope_id;
        let stage = entry.stage.clone();
        if let Err(e) = self.audit.append(entry).await {
            tracing::warn!(
                envelope = %envelope_id,
                stage = %stage,
                error = %e,
                "audit append failed"
            );
        }
    }
}
