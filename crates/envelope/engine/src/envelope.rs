//! The Envelope aggregate.
//!
//! Owns its recipient directory and field layout. Callers never assign fields
//! directly: drafts are edited through the methods below and every lifecycle
//! transition lives in [`crate::machine`].

use crate::fill::validate_pattern;
use crate::layout::FieldLayout;
use crate::routing::{self, RoutingEngine};
use chrono::{DateTime, Utc};
use envelope_types::{
    Actor, CapabilityToken, DocumentKey, EnvelopeId, EnvelopeStatus, Field, FieldConstraints,
    FieldId, FieldKind, FieldPosition, NewField, NewRecipient, Recipient, RecipientId,
    RecipientSummary, RenderedOutput, SigningError, SigningResult, TenantId, WorkflowType,
};
use serde::{Deserialize, Serialize};

/// Longest accepted envelope title.
pub const MAX_TITLE_LEN: usize = 512;

fn default_workflow() -> WorkflowType {
    WorkflowType::Sequential
}

/// Request to create a draft envelope in one go.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewEnvelope {
    pub title: String,
    pub document_key: DocumentKey,
    #[serde(default = "default_workflow")]
    pub workflow: WorkflowType,
    #[serde(default)]
    pub recipients: Vec<NewRecipient>,
    /// Fields refer to recipients by their index in `recipients`.
    #[serde(default)]
    pub fields: Vec<LayoutField>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A field placed at creation time, bound to a recipient by index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutField {
    pub recipient: usize,
    pub kind: FieldKind,
    pub position: FieldPosition,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub constraints: FieldConstraints,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub(crate) id: EnvelopeId,
    pub(crate) tenant_id: TenantId,
    pub(crate) created_by: String,
    pub(crate) title: String,
    pub(crate) document_key: DocumentKey,
    /// Page count of the source document, when it has been inspected.
    #[serde(default)]
    pub(crate) document_pages: Option<u32>,
    pub(crate) workflow: WorkflowType,
    pub(crate) status: EnvelopeStatus,
    pub(crate) recipients: Vec<Recipient>,
    pub(crate) fields: FieldLayout,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) sent_at: Option<DateTime<Utc>>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) declined_at: Option<DateTime<Utc>>,
    pub(crate) cancelled_at: Option<DateTime<Utc>>,
    pub(crate) expired_at: Option<DateTime<Utc>>,
    /// Envelope-wide deadline.
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) rendered: Option<RenderedOutput>,
    pub(crate) version: u64,
}

impl Envelope {
    /// Create a draft owned by the actor's tenant.
    pub fn create(spec: NewEnvelope, actor: &Actor, now: DateTime<Utc>) -> SigningResult<Self> {
        Self::build(spec, None, actor, now)
    }

    /// Create a draft over a source document with `document_pages` pages.
    /// Every field placed on it, now or later, must land on one of them.
    pub fn create_for_document(
        spec: NewEnvelope,
        document_pages: u32,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> SigningResult<Self> {
        if document_pages == 0 {
            return Err(SigningError::validation("source document has no pages"));
        }
        Self::build(spec, Some(document_pages), actor, now)
    }

    fn build(
        spec: NewEnvelope,
        document_pages: Option<u32>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> SigningResult<Self> {
        let title = spec.title.trim().to_string();
        if title.is_empty() {
            return Err(SigningError::validation("envelope title must not be empty"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(SigningError::validation(format!(
                "envelope title longer than {} characters",
                MAX_TITLE_LEN
            )));
        }
        if spec.document_key.as_str().trim().is_empty() {
            return Err(SigningError::validation("document key must not be empty"));
        }
        if let Some(deadline) = spec.expires_at {
            if deadline <= now {
                return Err(SigningError::validation("expiry deadline is in the past"));
            }
        }

        let mut envelope = Self {
            id: EnvelopeId::generate(),
            tenant_id: actor.tenant_id.clone(),
            created_by: actor.actor_id.clone(),
            title,
            document_key: spec.document_key,
            document_pages,
            workflow: spec.workflow,
            status: EnvelopeStatus::Draft,
            recipients: Vec::with_capacity(spec.recipients.len()),
            fields: FieldLayout::new(),
            created_at: now,
            sent_at: None,
            completed_at: None,
            declined_at: None,
            cancelled_at: None,
            expired_at: None,
            expires_at: spec.expires_at,
            rendered: None,
            version: 0,
        };

        let mut ids = Vec::with_capacity(spec.recipients.len());
        for r in spec.recipients {
            ids.push(envelope.add_recipient(r)?);
        }
        for f in spec.fields {
            let recipient_id = *ids.get(f.recipient).ok_or_else(|| {
                SigningError::validation(format!(
                    "field refers to recipient #{} but only {} were given",
                    f.recipient,
                    ids.len()
                ))
            })?;
            envelope.add_field(NewField {
                recipient_id,
                kind: f.kind,
                position: f.position,
                required: f.required,
                label: f.label,
                constraints: f.constraints,
            })?;
        }
        Ok(envelope)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> EnvelopeId {
        self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn document_key(&self) -> &DocumentKey {
        &self.document_key
    }

    pub fn document_pages(&self) -> Option<u32> {
        self.document_pages
    }

    pub fn workflow(&self) -> WorkflowType {
        self.workflow
    }

    pub fn status(&self) -> EnvelopeStatus {
        self.status
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn recipient(&self, id: RecipientId) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.id == id)
    }

    pub fn fields(&self) -> &FieldLayout {
        &self.fields
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn declined_at(&self) -> Option<DateTime<Utc>> {
        self.declined_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn expired_at(&self) -> Option<DateTime<Utc>> {
        self.expired_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn rendered(&self) -> Option<&RenderedOutput> {
        self.rendered.as_ref()
    }

    /// Version of the last persisted write.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set by repositories after a successful write.
    pub fn stamp_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn routing(&self) -> RoutingEngine {
        RoutingEngine::new(self.workflow)
    }

    /// Recipients currently holding the turn.
    pub fn active_recipients(&self) -> Vec<RecipientId> {
        self.routing().active_set(&self.recipients)
    }

    pub fn is_complete(&self) -> bool {
        routing::is_complete(&self.recipients)
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|d| now >= d).unwrap_or(false)
    }

    /// Every issued token and the recipient holding it.
    pub fn tokens(&self) -> impl Iterator<Item = (&CapabilityToken, RecipientId)> {
        self.recipients
            .iter()
            .filter_map(|r| r.grant.as_ref().map(|g| (&g.token, r.id)))
    }

    pub fn recipient_by_token(&self, token: &CapabilityToken) -> Option<&Recipient> {
        self.recipients
            .iter()
            .find(|r| r.grant.as_ref().map(|g| &g.token == token).unwrap_or(false))
    }

    /// Token-free projection for the envelope owner.
    pub fn summary(&self) -> EnvelopeSummary {
        EnvelopeSummary {
            id: self.id,
            title: self.title.clone(),
            status: self.status,
            workflow: self.workflow,
            document_key: self.document_key.clone(),
            document_pages: self.document_pages,
            recipients: self.recipients.iter().map(Recipient::public_view).collect(),
            fields: self.fields.iter().cloned().collect(),
            active: self.active_recipients(),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            sent_at: self.sent_at,
            completed_at: self.completed_at,
            declined_at: self.declined_at,
            cancelled_at: self.cancelled_at,
            expired_at: self.expired_at,
            expires_at: self.expires_at,
            rendered: self.rendered.clone(),
            version: self.version,
        }
    }

    // ── Draft editing ────────────────────────────────────────────────

    fn ensure_draft(&self, action: &str) -> SigningResult<()> {
        if self.status != EnvelopeStatus::Draft {
            return Err(SigningError::conflict(format!(
                "cannot {} an envelope in status {}",
                action, self.status
            )));
        }
        Ok(())
    }

    pub fn add_recipient(&mut self, spec: NewRecipient) -> SigningResult<RecipientId> {
        self.ensure_draft("add recipients to")?;
        if spec.name.trim().is_empty() {
            return Err(SigningError::validation("recipient name must not be empty"));
        }
        let email = spec.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(SigningError::validation(format!(
                "recipient email '{}' is invalid",
                spec.email
            )));
        }
        let recipient = Recipient::new(NewRecipient {
            order: spec.order,
            role: spec.role,
            name: spec.name.trim().to_string(),
            email: email.to_string(),
        });
        let id = recipient.id;
        self.recipients.push(recipient);
        Ok(id)
    }

    /// Remove a recipient and every field bound to it. Returns the number of
    /// fields removed.
    pub fn remove_recipient(&mut self, id: RecipientId) -> SigningResult<usize> {
        self.ensure_draft("remove recipients from")?;
        let idx = self
            .recipients
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| SigningError::not_found(format!("recipient {}", id)))?;
        self.recipients.remove(idx);
        Ok(self.fields.remove_for_recipient(id))
    }

    pub fn add_field(&mut self, spec: NewField) -> SigningResult<FieldId> {
        self.ensure_draft("place fields on")?;
        if self.recipient(spec.recipient_id).is_none() {
            return Err(SigningError::validation(format!(
                "recipient {} is not part of envelope {}",
                spec.recipient_id, self.id
            )));
        }
        spec.position.validate()?;
        self.check_page(spec.position.page)?;
        if let Some(pattern) = &spec.constraints.pattern {
            validate_pattern(pattern)?;
        }
        if let (Some(min), Some(max)) = (spec.constraints.min_length, spec.constraints.max_length) {
            if min > max {
                return Err(SigningError::validation(
                    "min_length must not exceed max_length",
                ));
            }
        }
        let field = Field::new(spec);
        let id = field.id;
        self.fields.push(field);
        Ok(id)
    }

    pub fn remove_field(&mut self, id: FieldId) -> SigningResult<()> {
        self.ensure_draft("remove fields from")?;
        self.fields
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SigningError::not_found(format!("field {}", id)))
    }

    /// Fields must sit on a page the source document has.
    pub(crate) fn check_page(&self, page: u32) -> SigningResult<()> {
        match self.document_pages {
            Some(pages) if page > pages => Err(SigningError::validation(format!(
                "field is on page {} but the document has {} page(s)",
                page, pages
            ))),
            _ => Ok(()),
        }
    }

    /// Only drafts may be deleted outright.
    pub fn ensure_deletable(&self) -> SigningResult<()> {
        self.ensure_draft("delete")
    }

    // ── Rendered output ──────────────────────────────────────────────

    /// Attach the rendered document. Returns `false` when the same artifact
    /// was already attached.
    pub fn attach_rendered(&mut self, output: RenderedOutput) -> SigningResult<bool> {
        if self.status != EnvelopeStatus::Completed {
            return Err(SigningError::conflict(format!(
                "envelope {} is {}, not COMPLETED",
                self.id, self.status
            )));
        }
        match &self.rendered {
            Some(existing) if existing.same_artifact(&output) => Ok(false),
            Some(existing) => Err(SigningError::conflict(format!(
                "envelope {} already has rendered output {}",
                self.id, existing.key
            ))),
            None => {
                self.rendered = Some(output);
                Ok(true)
            }
        }
    }
}

/// Owner-facing view of an envelope; tokens are never included.
#[derive(Clone, Debug, Serialize)]
pub struct EnvelopeSummary {
    pub id: EnvelopeId,
    pub title: String,
    pub status: EnvelopeStatus,
    pub workflow: WorkflowType,
    pub document_key: DocumentKey,
    pub document_pages: Option<u32>,
    pub recipients: Vec<RecipientSummary>,
    pub fields: Vec<Field>,
    pub active: Vec<RecipientId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rendered: Option<RenderedOutput>,
    pub version: u64,
}
