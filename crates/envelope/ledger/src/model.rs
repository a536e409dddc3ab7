use chrono::{DateTime, Utc};
use envelope_types::{EnvelopeEvent, EnvelopeId, RecipientId, SignatureCapture};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input for [`crate::SignatureStore::create`].
#[derive(Debug, Clone)]
pub struct NewSignature {
    pub envelope_id: EnvelopeId,
    pub recipient_id: RecipientId,
    pub signer_name: String,
    pub signer_email: String,
    pub capture: SignatureCapture,
}

/// Input for [`crate::AuditTrail::append`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditAppend {
    pub envelope_id: EnvelopeId,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub stage: String,
    #[serde(default)]
    pub recipient_id: Option<RecipientId>,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
}

impl AuditAppend {
    /// Audit entry describing a committed envelope event.
    pub fn from_event(event: &EnvelopeEvent, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        let payload = serde_json::to_value(event).unwrap_or(Value::Null);
        let message = match event.recipient_id() {
            Some(r) => format!("{} for recipient {}", event.name(), r),
            None => event.name().to_string(),
        };
        Self {
            envelope_id: event.envelope_id(),
            timestamp: at,
            actor: actor.into(),
            stage: event.name().to_string(),
            recipient_id: event.recipient_id(),
            message,
            payload,
        }
    }
}

/// Tamper-evident audit record, linked to its predecessor in the same
/// envelope's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub envelope_id: EnvelopeId,
    /// 1-based position within the envelope's chain.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub stage: String,
    pub recipient_id: Option<RecipientId>,
    pub message: String,
    pub payload: Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Outcome of walking one envelope's audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub envelope_id: EnvelopeId,
    pub records: u64,
    pub valid: bool,
    /// Sequence of the first record whose link or hash does not check out.
    pub broken_at: Option<u64>,
}
