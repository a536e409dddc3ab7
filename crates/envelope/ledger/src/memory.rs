//! In-memory reference implementation of the ledger traits.
//!
//! Deterministic and test-friendly. A durable deployment would put the same
//! traits over a transactional store.

use crate::hashing::{audit_hash, recompute_audit_hash, signature_hash};
use crate::model::{AuditAppend, AuditRecord, ChainVerification, NewSignature};
use crate::traits::{AuditTrail, SignatureStore};
use crate::{LedgerError, LedgerResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use envelope_types::{CaptureMethod, EnvelopeId, SignatureId, SignatureRecord};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Largest accepted signature image.
pub const MAX_SIGNATURE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Default)]
pub struct InMemoryLedger {
    signatures: RwLock<HashMap<SignatureId, SignatureRecord>>,
    by_envelope: RwLock<HashMap<EnvelopeId, Vec<SignatureId>>>,
    audits: RwLock<HashMap<EnvelopeId, Vec<AuditRecord>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate(input: &NewSignature) -> LedgerResult<()> {
    if !input.capture.consent {
        return Err(LedgerError::InvalidInput(
            "electronic signature consent is required".to_string(),
        ));
    }
    if input.signer_name.trim().is_empty() {
        return Err(LedgerError::InvalidInput(
            "signer name must not be empty".to_string(),
        ));
    }
    let image = &input.capture.image;
    if image.len() > MAX_SIGNATURE_IMAGE_BYTES {
        return Err(LedgerError::InvalidInput(format!(
            "signature image exceeds {} bytes",
            MAX_SIGNATURE_IMAGE_BYTES
        )));
    }
    if image.is_empty() && input.capture.method != CaptureMethod::Typed {
        return Err(LedgerError::InvalidInput(format!(
            "{} signatures need an image",
            input.capture.method.label()
        )));
    }
    Ok(())
}

#[async_trait]
impl SignatureStore for InMemoryLedger {
    async fn create(
        &self,
        input: NewSignature,
        now: DateTime<Utc>,
    ) -> LedgerResult<SignatureRecord> {
        validate(&input)?;

        let mut record = SignatureRecord {
            id: SignatureId::generate(),
            envelope_id: input.envelope_id,
            recipient_id: input.recipient_id,
            signer_name: input.signer_name.trim().to_string(),
            signer_email: input.signer_email,
            method: input.capture.method,
            image: input.capture.image,
            metadata: input.capture.metadata,
            consent: input.capture.consent,
            consented_at: now,
            created_at: now,
            hash: String::new(),
        };
        record.hash = signature_hash(&record)?;

        let mut signatures = self
            .signatures
            .write()
            .map_err(|_| LedgerError::Backend("signatures lock poisoned".to_string()))?;
        if signatures.contains_key(&record.id) {
            return Err(LedgerError::Conflict(format!(
                "signature {} already exists",
                record.id
            )));
        }
        let mut index = self
            .by_envelope
            .write()
            .map_err(|_| LedgerError::Backend("signature index lock poisoned".to_string()))?;
        index.entry(record.envelope_id).or_default().push(record.id);
        signatures.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: SignatureId) -> LedgerResult<Option<SignatureRecord>> {
        let guard = self
            .signatures
            .read()
            .map_err(|_| LedgerError::Backend("signatures lock poisoned".to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_for_envelope(
        &self,
        envelope_id: EnvelopeId,
    ) -> LedgerResult<Vec<SignatureRecord>> {
        let index = self
            .by_envelope
            .read()
            .map_err(|_| LedgerError::Backend("signature index lock poisoned".to_string()))?;
        let signatures = self
            .signatures
            .read()
            .map_err(|_| LedgerError::Backend("signatures lock poisoned".to_string()))?;
        Ok(index
            .get(&envelope_id)
            .map(|ids| ids.iter().filter_map(|id| signatures.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AuditTrail for InMemoryLedger {
    async fn append(&self, event: AuditAppend) -> LedgerResult<AuditRecord> {
        let mut guard = self
            .audits
            .write()
            .map_err(|_| LedgerError::Backend("audit lock poisoned".to_string()))?;
        let chain = guard.entry(event.envelope_id).or_default();

        let previous_hash = chain.last().map(|e| e.hash.clone());
        let sequence = chain.len() as u64 + 1;
        let hash = audit_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = AuditRecord {
            event_id: format!("audit-{}", Uuid::new_v4()),
            envelope_id: event.envelope_id,
            sequence,
            timestamp: event.timestamp,
            actor: event.actor,
            stage: event.stage,
            recipient_id: event.recipient_id,
            message: event.message,
            payload: event.payload,
            previous_hash,
            hash,
        };
        chain.push(record.clone());
        Ok(record)
    }

    async fn list(&self, envelope_id: EnvelopeId) -> LedgerResult<Vec<AuditRecord>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| LedgerError::Backend("audit lock poisoned".to_string()))?;
        Ok(guard.get(&envelope_id).cloned().unwrap_or_default())
    }

    async fn verify_chain(&self, envelope_id: EnvelopeId) -> LedgerResult<ChainVerification> {
        let records = self.list(envelope_id).await?;
        let mut previous: Option<&str> = None;
        let mut broken_at = None;
        for (idx, record) in records.iter().enumerate() {
            let linked = record.previous_hash.as_deref() == previous
                && record.sequence == idx as u64 + 1;
            if !linked || recompute_audit_hash(record)? != record.hash {
                broken_at = Some(record.sequence);
                break;
            }
            previous = Some(record.hash.as_str());
        }
        Ok(ChainVerification {
            envelope_id,
            records: records.len() as u64,
            valid: broken_at.is_none(),
            broken_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::verify_signature;
    use envelope_types::{RecipientId, SignatureCapture, SignatureMetadata};

    fn capture(consent: bool) -> SignatureCapture {
        SignatureCapture {
            method: CaptureMethod::Typed,
            image: Vec::new(),
            metadata: SignatureMetadata::new(
                Some("203.0.113.7".into()),
                Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile".into()),
                None,
            ),
            consent,
        }
    }

    fn new_signature(envelope_id: EnvelopeId, consent: bool) -> NewSignature {
        NewSignature {
            envelope_id,
            recipient_id: RecipientId::generate(),
            signer_name: "Ada Lovelace".into(),
            signer_email: "ada@example.com".into(),
            capture: capture(consent),
        }
    }

    fn append_for(envelope_id: EnvelopeId, stage: &str) -> AuditAppend {
        AuditAppend {
            envelope_id,
            timestamp: Utc::now(),
            actor: "test".into(),
            stage: stage.into(),
            recipient_id: None,
            message: stage.into(),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn create_requires_consent() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .create(new_signature(EnvelopeId::generate(), false), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn drawn_signature_needs_image() {
        let ledger = InMemoryLedger::new();
        let mut input = new_signature(EnvelopeId::generate(), true);
        input.capture.method = CaptureMethod::Drawn;
        assert!(ledger.create(input, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn records_are_hashed_and_listed() {
        let ledger = InMemoryLedger::new();
        let env = EnvelopeId::generate();
        let a = ledger
            .create(new_signature(env, true), Utc::now())
            .await
            .unwrap();
        let b = ledger
            .create(new_signature(env, true), Utc::now())
            .await
            .unwrap();
        ledger
            .create(new_signature(EnvelopeId::generate(), true), Utc::now())
            .await
            .unwrap();

        assert!(verify_signature(&a));
        assert_ne!(a.hash, b.hash);
        assert_eq!(
            a.metadata.device_class,
            envelope_types::DeviceClass::Mobile
        );

        let listed = ledger.list_for_envelope(env).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(ledger.get(b.id).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn tampered_record_fails_verification() {
        let ledger = InMemoryLedger::new();
        let mut record = ledger
            .create(new_signature(EnvelopeId::generate(), true), Utc::now())
            .await
            .unwrap();
        record.signer_name = "Mallory".into();
        assert!(!verify_signature(&record));
    }

    #[tokio::test]
    async fn audit_chains_are_per_envelope() {
        let ledger = InMemoryLedger::new();
        let a = EnvelopeId::generate();
        let b = EnvelopeId::generate();
        let first = ledger.append(append_for(a, "envelope_sent")).await.unwrap();
        ledger.append(append_for(b, "envelope_sent")).await.unwrap();
        let second = ledger
            .append(append_for(a, "recipient_opened"))
            .await
            .unwrap();

        assert_eq!(first.sequence, 1);
        assert!(first.previous_hash.is_none());
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));

        let report = ledger.verify_chain(a).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.records, 2);
    }

    #[tokio::test]
    async fn verify_chain_detects_tampering() {
        let ledger = InMemoryLedger::new();
        let env = EnvelopeId::generate();
        for stage in ["envelope_sent", "recipient_opened", "recipient_completed"] {
            ledger.append(append_for(env, stage)).await.unwrap();
        }
        {
            let mut guard = ledger.audits.write().unwrap();
            let chain = guard.get_mut(&env).unwrap();
            chain[1].message = "rewritten".into();
        }
        let report = ledger.verify_chain(env).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(2));
    }
}
