//! The envelope service: every externally triggered operation.
//!
//! Each mutation runs under the envelope's lock as one read-modify-write:
//! load, check, apply, versioned write. Only after the write lands are the
//! emitted events fanned out to the audit trail, the notification queue and
//! the render queue.

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::locks::EnvelopeLocks;
use crate::notify::{notifications_for, LoggingNotifier, NotificationQueue, Notifier};
use crate::render_queue::{FailedRender, RenderQueue, PDF_CONTENT_TYPE};
use crate::shared::Shared;
use chrono::{DateTime, Utc};
use envelope_engine::{
    authorize, Access, Envelope, EnvelopeEvent, EnvelopeSummary, FieldInput, NewEnvelope,
    RecipientView, TokenPolicy,
};
use envelope_ledger::{
    AuditAppend, AuditRecord, AuditTrail, ChainVerification, InMemoryLedger, NewSignature,
    SignatureStore,
};
use envelope_render::{check_image, inspect_document, DocumentInfo};
use envelope_store::{
    DocumentStorage, EnvelopeRepository, InMemoryDocumentStorage, InMemoryEnvelopeRepository,
    StorageError,
};
use envelope_types::{
    Actor, CapabilityToken, DocumentKey, EnvelopeId, EnvelopeStatus, Field, FieldId, NewField,
    NewRecipient, RecipientId, RecipientStatus, SignatureCapture, SignatureId, SignatureRecord,
    SigningError, SigningResult,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Pluggable collaborators.
pub struct ServiceComponents {
    pub repository: Arc<dyn EnvelopeRepository>,
    pub signatures: Arc<dyn SignatureStore>,
    pub audit: Arc<dyn AuditTrail>,
    pub documents: Arc<dyn DocumentStorage>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl ServiceComponents {
    /// Everything in memory, notifications to the log.
    pub fn in_memory() -> Self {
        Self::with_documents(Arc::new(InMemoryDocumentStorage::new()))
    }

    /// In-memory records with the given document storage.
    pub fn with_documents(documents: Arc<dyn DocumentStorage>) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        Self {
            repository: Arc::new(InMemoryEnvelopeRepository::new()),
            signatures: ledger.clone(),
            audit: ledger,
            documents,
            notifier: Arc::new(LoggingNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Result of a successful completion.
#[derive(Clone, Debug, Serialize)]
pub struct Completion {
    pub envelope_id: EnvelopeId,
    pub recipient_id: RecipientId,
    pub signature_id: SignatureId,
    pub recipient_status: RecipientStatus,
    pub envelope_status: EnvelopeStatus,
}

/// A stored source document.
#[derive(Clone, Debug, Serialize)]
pub struct UploadedDocument {
    pub key: DocumentKey,
    pub url: String,
    pub pages: u32,
}

/// Result of one expiry pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub envelopes_scanned: usize,
    pub envelopes_expired: usize,
    pub recipients_expired: usize,
}

pub struct EnvelopeService {
    shared: Arc<Shared>,
    notifications: NotificationQueue,
    renders: RenderQueue,
    policy: TokenPolicy,
    config: ServiceConfig,
    _notification_task: JoinHandle<()>,
}

impl EnvelopeService {
    /// Build the service and start its notification task. Must be called
    /// inside a Tokio runtime.
    pub fn new(config: ServiceConfig, components: ServiceComponents) -> SigningResult<Arc<Self>> {
        config.validate()?;
        let shared = Arc::new(Shared {
            repo: components.repository,
            signatures: components.signatures,
            audit: components.audit,
            documents: components.documents,
            locks: EnvelopeLocks::new(),
            clock: components.clock,
        });
        let (notifications, task) =
            NotificationQueue::start(components.notifier, config.notifications.queue_capacity);
        let renders = RenderQueue::new(shared.clone(), config.render.clone());
        Ok(Arc::new(Self {
            shared,
            notifications,
            renders,
            policy: config.tokens.policy(),
            config,
            _notification_task: task,
        }))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn renders(&self) -> &RenderQueue {
        &self.renders
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.shared.now()
    }

    // ── Documents ────────────────────────────────────────────────────

    /// Store a source PDF for the actor's tenant.
    pub async fn upload_document(
        &self,
        actor: &Actor,
        bytes: Vec<u8>,
    ) -> SigningResult<UploadedDocument> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(SigningError::validation("document is not a PDF"));
        }
        let (bytes, info) = inspect(bytes).await?;
        let key = DocumentKey::new(format!(
            "documents/{}/{}.pdf",
            actor.tenant_id,
            uuid::Uuid::new_v4()
        ));
        let stored = self
            .shared
            .documents
            .put(bytes, &key, PDF_CONTENT_TYPE)
            .await?;
        tracing::info!(
            tenant = %actor.tenant_id,
            key = %stored.key,
            pages = info.pages,
            "document uploaded"
        );
        Ok(UploadedDocument {
            key: stored.key,
            url: stored.url,
            pages: info.pages,
        })
    }

    /// Fetch a stored document, e.g. the rendered output.
    pub async fn download(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<Vec<u8>> {
        let envelope = self.load_owned(actor, id).await?;
        let rendered = envelope
            .rendered()
            .ok_or_else(|| SigningError::not_found(format!("rendered output of envelope {}", id)))?;
        Ok(self.shared.documents.get(&rendered.key).await?)
    }

    // ── Owner operations ─────────────────────────────────────────────

    pub async fn create_envelope(
        &self,
        actor: &Actor,
        spec: NewEnvelope,
    ) -> SigningResult<EnvelopeSummary> {
        let info = self.ensure_document(&spec.document_key).await?;
        let now = self.now();
        let envelope = Envelope::create_for_document(spec, info.pages, actor, now)?;
        let stored = self.shared.repo.insert(envelope).await?;
        tracing::info!(
            envelope = %stored.id(),
            tenant = %actor.tenant_id,
            recipients = stored.recipients().len(),
            fields = stored.fields().len(),
            "envelope created"
        );
        self.shared
            .record_audit(AuditAppend {
                envelope_id: stored.id(),
                timestamp: now,
                actor: actor.actor_id.clone(),
                stage: "envelope_created".to_string(),
                recipient_id: None,
                message: format!("envelope '{}' created", stored.title()),
                payload: json!({
                    "document_key": stored.document_key(),
                    "workflow": stored.workflow(),
                }),
            })
            .await;
        Ok(stored.summary())
    }

    pub async fn get_envelope(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<EnvelopeSummary> {
        Ok(self.load_owned(actor, id).await?.summary())
    }

    pub async fn list_envelopes(&self, actor: &Actor) -> SigningResult<Vec<EnvelopeSummary>> {
        let mut envelopes = self.shared.repo.list_for_tenant(&actor.tenant_id).await?;
        envelopes.sort_by_key(|e| e.created_at());
        Ok(envelopes.iter().map(Envelope::summary).collect())
    }

    pub async fn add_recipient(
        &self,
        actor: &Actor,
        id: EnvelopeId,
        spec: NewRecipient,
    ) -> SigningResult<RecipientId> {
        let (recipient_id, _) = self
            .mutate_owned(actor, id, |e, _| Ok((e.add_recipient(spec)?, Vec::new())))
            .await?;
        Ok(recipient_id)
    }

    /// Remove a draft recipient and their fields; returns how many fields went.
    pub async fn remove_recipient(
        &self,
        actor: &Actor,
        id: EnvelopeId,
        recipient_id: RecipientId,
    ) -> SigningResult<usize> {
        let (removed, _) = self
            .mutate_owned(actor, id, |e, _| Ok((e.remove_recipient(recipient_id)?, Vec::new())))
            .await?;
        Ok(removed)
    }

    pub async fn add_field(&self, actor: &Actor, id: EnvelopeId, spec: NewField) -> SigningResult<FieldId> {
        let (field_id, _) = self
            .mutate_owned(actor, id, |e, _| Ok((e.add_field(spec)?, Vec::new())))
            .await?;
        Ok(field_id)
    }

    pub async fn remove_field(&self, actor: &Actor, id: EnvelopeId, field_id: FieldId) -> SigningResult<()> {
        self.mutate_owned(actor, id, |e, _| Ok((e.remove_field(field_id)?, Vec::new())))
            .await?;
        Ok(())
    }

    pub async fn send(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<EnvelopeSummary> {
        let policy = self.policy;
        let (_, stored) = self
            .mutate_owned(actor, id, |e, now| Ok(((), e.send(&policy, now)?)))
            .await?;
        Ok(stored.summary())
    }

    pub async fn cancel(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<EnvelopeSummary> {
        let (_, stored) = self
            .mutate_owned(actor, id, |e, now| Ok(((), e.cancel(now)?)))
            .await?;
        Ok(stored.summary())
    }

    pub async fn resend(
        &self,
        actor: &Actor,
        id: EnvelopeId,
        recipient_id: RecipientId,
    ) -> SigningResult<EnvelopeSummary> {
        let policy = self.policy;
        let (_, stored) = self
            .mutate_owned(actor, id, |e, now| Ok(((), e.resend(recipient_id, &policy, now)?)))
            .await?;
        Ok(stored.summary())
    }

    /// Delete a draft outright; its fields go with it.
    pub async fn delete_draft(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<()> {
        let _guard = self.shared.locks.acquire(id).await;
        let envelope = self.load_owned(actor, id).await?;
        envelope.ensure_deletable()?;
        self.shared.repo.delete(id, envelope.version()).await?;
        tracing::info!(envelope = %id, "draft deleted");
        self.shared
            .record_audit(AuditAppend {
                envelope_id: id,
                timestamp: self.now(),
                actor: actor.actor_id.clone(),
                stage: "envelope_deleted".to_string(),
                recipient_id: None,
                message: "draft deleted".to_string(),
                payload: json!({ "fields_removed": envelope.fields().len() }),
            })
            .await;
        Ok(())
    }

    /// Re-enqueue the render of a completed envelope. Returns `false` when
    /// the envelope is already rendered.
    pub async fn retry_render(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<bool> {
        let envelope = self.load_owned(actor, id).await?;
        if envelope.status() != EnvelopeStatus::Completed {
            return Err(SigningError::conflict(format!(
                "envelope {} is {}, only completed envelopes are rendered",
                id,
                envelope.status()
            )));
        }
        if envelope.rendered().is_some() {
            return Ok(false);
        }
        tracing::info!(envelope = %id, "render retry requested");
        self.renders.retry(id);
        Ok(true)
    }

    pub fn failed_renders(&self) -> Vec<FailedRender> {
        self.renders.failed()
    }

    pub async fn audit_trail(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<Vec<AuditRecord>> {
        self.load_owned(actor, id).await?;
        Ok(self.shared.audit.list(id).await?)
    }

    pub async fn verify_audit(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<ChainVerification> {
        self.load_owned(actor, id).await?;
        Ok(self.shared.audit.verify_chain(id).await?)
    }

    pub async fn signatures(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<Vec<SignatureRecord>> {
        self.load_owned(actor, id).await?;
        Ok(self.shared.signatures.list_for_envelope(id).await?)
    }

    // ── Token operations ─────────────────────────────────────────────

    /// The recipient's projection. The first view by a routed recipient
    /// marks them opened.
    pub async fn view(&self, token: &CapabilityToken) -> SigningResult<RecipientView> {
        let (recipient_id, stored) = self
            .mutate_by_token(token, Access::View, |e, rid, now| {
                let events = if e.status().is_routing() {
                    e.open(rid, now)?
                } else {
                    Vec::new()
                };
                Ok((rid, events))
            })
            .await?;
        let recipient = stored
            .recipient(recipient_id)
            .ok_or_else(|| SigningError::not_found(format!("recipient {}", recipient_id)))?;
        Ok(RecipientView::build(&stored, recipient, self.now()))
    }

    pub async fn fill_field(
        &self,
        token: &CapabilityToken,
        field_id: FieldId,
        input: FieldInput,
    ) -> SigningResult<Field> {
        let (_, stored) = self
            .mutate_by_token(token, Access::Act, |e, rid, now| {
                Ok(((), e.fill_field(rid, field_id, &input, now)?))
            })
            .await?;
        stored
            .fields()
            .get(field_id)
            .cloned()
            .ok_or_else(|| SigningError::not_found(format!("field {}", field_id)))
    }

    /// Sign or approve: append the signature record, then record completion.
    pub async fn complete(
        &self,
        token: &CapabilityToken,
        capture: SignatureCapture,
    ) -> SigningResult<Completion> {
        let id = self.resolve(token).await?;
        let _guard = self.shared.locks.acquire(id).await;
        let mut envelope = self.reload_for_token(id).await?;
        let now = self.now();
        let recipient = authorize(&envelope, token, Access::Act, now)?.clone();

        let missing = envelope.fields().unsatisfied_required(recipient.id);
        if let Some(field) = missing.first() {
            return Err(SigningError::validation(format!(
                "{} required field(s) still empty, first is {}",
                missing.len(),
                field.id
            )));
        }
        if !capture.image.is_empty() {
            check_image(&capture.image).map_err(|e| SigningError::validation(e.to_string()))?;
        }

        let record = self
            .shared
            .signatures
            .create(
                NewSignature {
                    envelope_id: id,
                    recipient_id: recipient.id,
                    signer_name: recipient.contact.name.clone(),
                    signer_email: recipient.contact.email.clone(),
                    capture,
                },
                now,
            )
            .await?;

        let version = envelope.version();
        let events = envelope.record_completion(recipient.id, &record, &self.policy, now)?;
        let stored = self.shared.repo.update(envelope, version).await?;
        tracing::info!(
            envelope = %id,
            recipient = %recipient.id,
            signature = %record.id,
            method = record.method.label(),
            "recipient completed"
        );
        self.dispatch(events, &format!("recipient:{}", recipient.id), now)
            .await;

        let recipient_status = stored
            .recipient(recipient.id)
            .map(|r| r.status)
            .unwrap_or(RecipientStatus::Signed);
        Ok(Completion {
            envelope_id: id,
            recipient_id: recipient.id,
            signature_id: record.id,
            recipient_status,
            envelope_status: stored.status(),
        })
    }

    pub async fn decline(&self, token: &CapabilityToken, reason: &str) -> SigningResult<EnvelopeStatus> {
        let (_, stored) = self
            .mutate_by_token(token, Access::Act, |e, rid, now| {
                Ok(((), e.decline(rid, reason, now)?))
            })
            .await?;
        Ok(stored.status())
    }

    // ── Expiry ───────────────────────────────────────────────────────

    /// Expire envelopes past their deadline and recipients whose token ran
    /// out.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SigningResult<SweepReport> {
        let mut report = SweepReport::default();
        for id in self.shared.repo.list_open().await? {
            report.envelopes_scanned += 1;
            let _guard = self.shared.locks.acquire(id).await;
            let Some(mut envelope) = self.shared.repo.get(id).await? else {
                continue;
            };
            let version = envelope.version();
            let events = envelope.sweep(now);
            if events.is_empty() {
                continue;
            }
            match self.shared.repo.update(envelope, version).await {
                Ok(_) => {}
                Err(StorageError::Conflict(reason)) => {
                    tracing::debug!(envelope = %id, reason = %reason, "sweep lost a race, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            for event in &events {
                match event {
                    EnvelopeEvent::EnvelopeExpired { .. } => report.envelopes_expired += 1,
                    EnvelopeEvent::RecipientExpired { .. } => report.recipients_expired += 1,
                    _ => {}
                }
            }
            self.dispatch(events, "system:expiry", now).await;
        }
        self.shared.locks.prune();
        if report.envelopes_expired > 0 || report.recipients_expired > 0 {
            tracing::info!(
                scanned = report.envelopes_scanned,
                envelopes = report.envelopes_expired,
                recipients = report.recipients_expired,
                "expiry sweep"
            );
        }
        Ok(report)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn ensure_document(&self, key: &DocumentKey) -> SigningResult<DocumentInfo> {
        match self.shared.documents.get(key).await {
            Ok(bytes) => Ok(inspect(bytes).await?.1),
            Err(StorageError::NotFound(_)) => Err(SigningError::validation(format!(
                "document {} has not been uploaded",
                key
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Load an envelope owned by the actor's tenant. Other tenants' envelopes
    /// are reported as missing.
    async fn load_owned(&self, actor: &Actor, id: EnvelopeId) -> SigningResult<Envelope> {
        match self.shared.repo.get(id).await? {
            Some(envelope) if envelope.tenant_id() == &actor.tenant_id => Ok(envelope),
            _ => Err(SigningError::not_found(format!("envelope {}", id))),
        }
    }

    async fn resolve(&self, token: &CapabilityToken) -> SigningResult<EnvelopeId> {
        self.shared
            .repo
            .find_by_token(token)
            .await?
            .map(|e| e.id())
            .ok_or_else(|| SigningError::not_found("capability token"))
    }

    async fn reload_for_token(&self, id: EnvelopeId) -> SigningResult<Envelope> {
        self.shared
            .repo
            .get(id)
            .await?
            .ok_or_else(|| SigningError::not_found("capability token"))
    }

    async fn mutate_owned<T, F>(&self, actor: &Actor, id: EnvelopeId, op: F) -> SigningResult<(T, Envelope)>
    where
        F: FnOnce(&mut Envelope, DateTime<Utc>) -> SigningResult<(T, Vec<EnvelopeEvent>)>,
    {
        let _guard = self.shared.locks.acquire(id).await;
        let mut envelope = self.load_owned(actor, id).await?;
        let version = envelope.version();
        let now = self.now();
        let (value, events) = op(&mut envelope, now)?;
        let stored = self.shared.repo.update(envelope, version).await?;
        self.dispatch(events, &actor.actor_id, now).await;
        Ok((value, stored))
    }

    /// Resolve the token, lock its envelope, re-read it and run `op` for the
    /// authorised recipient. Nothing is written when `op` emits no events.
    async fn mutate_by_token<T, F>(
        &self,
        token: &CapabilityToken,
        access: Access,
        op: F,
    ) -> SigningResult<(T, Envelope)>
    where
        F: FnOnce(&mut Envelope, RecipientId, DateTime<Utc>) -> SigningResult<(T, Vec<EnvelopeEvent>)>,
    {
        let id = self.resolve(token).await?;
        let _guard = self.shared.locks.acquire(id).await;
        let mut envelope = self.reload_for_token(id).await?;
        let now = self.now();
        let recipient_id = authorize(&envelope, token, access, now)?.id;
        let version = envelope.version();
        let (value, events) = op(&mut envelope, recipient_id, now)?;
        if events.is_empty() {
            return Ok((value, envelope));
        }
        let stored = self.shared.repo.update(envelope, version).await?;
        self.dispatch(events, &format!("recipient:{}", recipient_id), now)
            .await;
        Ok((value, stored))
    }

    /// Fan committed events out. Nothing here can fail the transition.
    async fn dispatch(&self, events: Vec<EnvelopeEvent>, actor: &str, now: DateTime<Utc>) {
        for event in events {
            tracing::debug!(envelope = %event.envelope_id(), event = event.name(), "envelope event");
            self.shared
                .record_audit(AuditAppend::from_event(&event, actor, now))
                .await;
            for notification in notifications_for(&event) {
                self.notifications.enqueue(notification);
            }
            if let EnvelopeEvent::EnvelopeCompleted { envelope_id, .. } = &event {
                tracing::info!(envelope = %envelope_id, "envelope completed, render queued");
                self.renders.enqueue(*envelope_id);
            }
        }
    }
}

/// Parse a source PDF off the async runtime.
async fn inspect(bytes: Vec<u8>) -> SigningResult<(Vec<u8>, DocumentInfo)> {
    tokio::task::spawn_blocking(move || {
        inspect_document(&bytes)
            .map(|info| (bytes, info))
            .map_err(|e| SigningError::validation(e.to_string()))
    })
    .await
    .map_err(|e| SigningError::Storage(format!("document inspection aborted: {}", e)))?
}
