use crate::model::{AuditAppend, AuditRecord, ChainVerification, NewSignature};
use crate::LedgerResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use envelope_types::{EnvelopeId, SignatureId, SignatureRecord};

/// Append-only store of signature records.
///
/// No update or delete exists. A correction is a new record for the same
/// recipient.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    /// Create an immutable record with its content hash. Consent is required.
    async fn create(&self, input: NewSignature, now: DateTime<Utc>)
        -> LedgerResult<SignatureRecord>;

    async fn get(&self, id: SignatureId) -> LedgerResult<Option<SignatureRecord>>;

    /// Records for one envelope, oldest first.
    async fn list_for_envelope(&self, envelope_id: EnvelopeId)
        -> LedgerResult<Vec<SignatureRecord>>;
}

/// Per-envelope hash-linked audit trail.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    /// Append an event and return the canonical, hash-linked stored record.
    async fn append(&self, event: AuditAppend) -> LedgerResult<AuditRecord>;

    /// Records for one envelope, oldest first.
    async fn list(&self, envelope_id: EnvelopeId) -> LedgerResult<Vec<AuditRecord>>;

    /// Recompute every hash and link of the envelope's chain.
    async fn verify_chain(&self, envelope_id: EnvelopeId) -> LedgerResult<ChainVerification>;
}
