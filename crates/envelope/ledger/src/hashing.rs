//! Content hashes for signature records and audit links.

use crate::model::{AuditAppend, AuditRecord};
use crate::{LedgerError, LedgerResult};
use envelope_types::SignatureRecord;

/// BLAKE3 over the canonical JSON of every record field except `hash`.
pub fn signature_hash(record: &SignatureRecord) -> LedgerResult<String> {
    let canonical = serde_json::json!({
        "id": record.id,
        "envelope_id": record.envelope_id,
        "recipient_id": record.recipient_id,
        "signer_name": record.signer_name,
        "signer_email": record.signer_email,
        "method": record.method,
        "image": hex::encode(&record.image),
        "metadata": record.metadata,
        "consent": record.consent,
        "consented_at": record.consented_at,
        "created_at": record.created_at,
    });
    let bytes =
        serde_json::to_vec(&canonical).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// True when the stored hash matches the record content.
pub fn verify_signature(record: &SignatureRecord) -> bool {
    signature_hash(record)
        .map(|h| h == record.hash)
        .unwrap_or(false)
}

pub(crate) fn audit_hash(
    event: &AuditAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> LedgerResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "envelope_id": event.envelope_id,
        "timestamp": event.timestamp,
        "actor": event.actor,
        "stage": event.stage,
        "recipient_id": event.recipient_id,
        "message": event.message,
        "payload": event.payload,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| LedgerError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

/// Recompute a stored record's hash from its own content.
pub(crate) fn recompute_audit_hash(record: &AuditRecord) -> LedgerResult<String> {
    let append = AuditAppend {
        envelope_id: record.envelope_id,
        timestamp: record.timestamp,
        actor: record.actor.clone(),
        stage: record.stage.clone(),
        recipient_id: record.recipient_id,
        message: record.message.clone(),
        payload: record.payload.clone(),
    };
    audit_hash(&append, record.previous_hash.as_deref(), record.sequence)
}
