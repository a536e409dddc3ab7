//! Envelope persistence.
//!
//! Every write is a compare-and-swap on the envelope version, so two
//! read-modify-write cycles racing on the same envelope cannot both land: the
//! loser gets `Conflict`.

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use envelope_engine::Envelope;
use envelope_types::{CapabilityToken, EnvelopeId, TenantId};
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait EnvelopeRepository: Send + Sync {
    /// Store a new envelope. Returns it stamped with version 1.
    async fn insert(&self, envelope: Envelope) -> StorageResult<Envelope>;

    async fn get(&self, id: EnvelopeId) -> StorageResult<Option<Envelope>>;

    /// Resolve a capability token to the envelope holding it.
    async fn find_by_token(&self, token: &CapabilityToken) -> StorageResult<Option<Envelope>>;

    /// Replace the stored envelope if its version still equals
    /// `expected_version`. Returns the envelope stamped with the new version.
    async fn update(&self, envelope: Envelope, expected_version: u64)
        -> StorageResult<Envelope>;

    /// Remove an envelope and its token index entries.
    async fn delete(&self, id: EnvelopeId, expected_version: u64) -> StorageResult<()>;

    /// Identifiers of envelopes that are not yet terminal.
    async fn list_open(&self) -> StorageResult<Vec<EnvelopeId>>;

    async fn list_for_tenant(&self, tenant: &TenantId) -> StorageResult<Vec<Envelope>>;
}

#[derive(Default)]
struct Tables {
    envelopes: HashMap<EnvelopeId, Envelope>,
    tokens: HashMap<String, EnvelopeId>,
}

impl Tables {
    /// Every token the envelope holds must be unique across envelopes.
    fn check_tokens(&self, envelope: &Envelope) -> StorageResult<()> {
        for (token, _) in envelope.tokens() {
            if let Some(owner) = self.tokens.get(token.as_str()) {
                if *owner != envelope.id() {
                    return Err(StorageError::Conflict(format!(
                        "capability token {} already issued",
                        token.fingerprint()
                    )));
                }
            }
        }
        Ok(())
    }

    fn reindex(&mut self, envelope: &Envelope) {
        let id = envelope.id();
        self.tokens.retain(|_, owner| *owner != id);
        for (token, _) in envelope.tokens() {
            self.tokens.insert(token.as_str().to_string(), id);
        }
    }
}

/// In-memory repository for development and tests.
#[derive(Default)]
pub struct InMemoryEnvelopeRepository {
    tables: RwLock<Tables>,
}

impl InMemoryEnvelopeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .map(|t| t.envelopes.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::Backend("envelope table lock poisoned".to_string())
}

#[async_trait]
impl EnvelopeRepository for InMemoryEnvelopeRepository {
    async fn insert(&self, mut envelope: Envelope) -> StorageResult<Envelope> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.envelopes.contains_key(&envelope.id()) {
            return Err(StorageError::Conflict(format!(
                "envelope {} already exists",
                envelope.id()
            )));
        }
        tables.check_tokens(&envelope)?;
        envelope.stamp_version(1);
        tables.reindex(&envelope);
        tables.envelopes.insert(envelope.id(), envelope.clone());
        Ok(envelope)
    }

    async fn get(&self, id: EnvelopeId) -> StorageResult<Option<Envelope>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.envelopes.get(&id).cloned())
    }

    async fn find_by_token(&self, token: &CapabilityToken) -> StorageResult<Option<Envelope>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .tokens
            .get(token.as_str())
            .and_then(|id| tables.envelopes.get(id))
            .cloned())
    }

    async fn update(
        &self,
        mut envelope: Envelope,
        expected_version: u64,
    ) -> StorageResult<Envelope> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let current = tables
            .envelopes
            .get(&envelope.id())
            .ok_or_else(|| StorageError::NotFound(format!("envelope {}", envelope.id())))?;
        if current.version() != expected_version {
            return Err(StorageError::Conflict(format!(
                "envelope {} was modified concurrently (expected version {}, found {})",
                envelope.id(),
                expected_version,
                current.version()
            )));
        }
        tables.check_tokens(&envelope)?;
        envelope.stamp_version(expected_version + 1);
        tables.reindex(&envelope);
        tables.envelopes.insert(envelope.id(), envelope.clone());
        Ok(envelope)
    }

    async fn delete(&self, id: EnvelopeId, expected_version: u64) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let current = tables
            .envelopes
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(format!("envelope {}", id)))?;
        if current.version() != expected_version {
            return Err(StorageError::Conflict(format!(
                "envelope {} was modified concurrently",
                id
            )));
        }
        tables.envelopes.remove(&id);
        tables.tokens.retain(|_, owner| *owner != id);
        Ok(())
    }

    async fn list_open(&self) -> StorageResult<Vec<EnvelopeId>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .envelopes
            .values()
            .filter(|e| !e.status().is_terminal())
            .map(|e| e.id())
            .collect())
    }

    async fn list_for_tenant(&self, tenant: &TenantId) -> StorageResult<Vec<Envelope>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let mut envelopes: Vec<Envelope> = tables
            .envelopes
            .values()
            .filter(|e| e.tenant_id() == tenant)
            .cloned()
            .collect();
        envelopes.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use envelope_engine::{LayoutField, NewEnvelope, TokenPolicy};
    use envelope_types::{
        Actor, DocumentKey, FieldConstraints, FieldKind, FieldPosition, NewRecipient,
        RecipientRole, WorkflowType,
    };

    fn draft() -> Envelope {
        Envelope::create(
            NewEnvelope {
                title: "Purchase order".into(),
                document_key: DocumentKey::new("documents/po.pdf"),
                workflow: WorkflowType::Sequential,
                recipients: vec![NewRecipient {
                    order: 1,
                    role: RecipientRole::Signer,
                    name: "Buyer".into(),
                    email: "buyer@example.com".into(),
                }],
                fields: vec![LayoutField {
                    recipient: 0,
                    kind: FieldKind::Signature,
                    position: FieldPosition {
                        page: 1,
                        x: 10.0,
                        y: 10.0,
                        width: 20.0,
                        height: 5.0,
                    },
                    required: true,
                    label: None,
                    constraints: FieldConstraints::default(),
                }],
                expires_at: None,
            },
            &Actor::new("tenant-a", "owner"),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let repo = InMemoryEnvelopeRepository::new();
        let stored = repo.insert(draft()).await.unwrap();
        assert_eq!(stored.version(), 1);

        let mut a = stored.clone();
        let mut b = stored.clone();
        a.send(&TokenPolicy::default(), Utc::now()).unwrap();
        b.cancel(Utc::now()).unwrap();

        let a = repo.update(a, 1).await.unwrap();
        assert_eq!(a.version(), 2);
        let err = repo.update(b, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn tokens_resolve_after_update() {
        let repo = InMemoryEnvelopeRepository::new();
        let mut env = repo.insert(draft()).await.unwrap();
        env.send(&TokenPolicy::default(), Utc::now()).unwrap();
        let env = repo.update(env, 1).await.unwrap();

        let (token, _) = env.tokens().next().unwrap();
        let found = repo.find_by_token(token).await.unwrap().unwrap();
        assert_eq!(found.id(), env.id());

        let unknown = CapabilityToken::from_transport("00");
        assert!(repo.find_by_token(&unknown).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resend_replaces_token_in_index() {
        let repo = InMemoryEnvelopeRepository::new();
        let mut env = repo.insert(draft()).await.unwrap();
        env.send(&TokenPolicy::default(), Utc::now()).unwrap();
        let mut env = repo.update(env, 1).await.unwrap();
        let old = env.tokens().next().unwrap().0.clone();
        let rid = env.recipients()[0].id;

        env.resend(rid, &TokenPolicy::default(), Utc::now()).unwrap();
        let env = repo.update(env, 2).await.unwrap();
        let new = env.tokens().next().unwrap().0.clone();

        assert!(repo.find_by_token(&old).await.unwrap().is_none());
        assert!(repo.find_by_token(&new).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_drops_envelope_and_lists() {
        let repo = InMemoryEnvelopeRepository::new();
        let env = repo.insert(draft()).await.unwrap();
        assert_eq!(repo.list_open().await.unwrap(), vec![env.id()]);
        assert_eq!(
            repo.list_for_tenant(&TenantId::new("tenant-a"))
                .await
                .unwrap()
                .len(),
            1
        );
        repo.delete(env.id(), 1).await.unwrap();
        assert!(repo.get(env.id()).await.unwrap().is_none());
        assert!(repo.is_empty());
    }
}
