//! Envelope state machine.
//!
//! `DRAFT → SENT → IN_PROGRESS → COMPLETED`, with `DECLINED`, `CANCELLED` and
//! `EXPIRED` reachable from any non-terminal state. Each transition mutates
//! the aggregate in memory and returns the events it produced; persisting the
//! aggregate and dispatching the events is the caller's job.

use crate::access::check_can_act;
use crate::envelope::Envelope;
use crate::fill::{validate_input, FieldInput};
use chrono::{DateTime, Duration, Utc};
use envelope_types::{
    CapabilityToken, ContactInfo, EnvelopeEvent, EnvelopeStatus, FieldId, FieldKind, FieldValue,
    RecipientId, RecipientRole, RecipientStatus, SignatureRecord, SigningError, SigningResult,
    TokenGrant,
};

/// Longest accepted decline reason.
pub const MAX_REASON_LEN: usize = 2_000;

/// How capability tokens are minted.
#[derive(Clone, Copy, Debug)]
pub struct TokenPolicy {
    pub ttl: Duration,
    pub bytes: usize,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(72),
            bytes: 32,
        }
    }
}

impl TokenPolicy {
    fn issue(&self, now: DateTime<Utc>) -> TokenGrant {
        TokenGrant {
            token: CapabilityToken::generate(self.bytes),
            issued_at: now,
            expires_at: now + self.ttl,
        }
    }
}

impl Envelope {
    // ── Lifecycle ────────────────────────────────────────────────────

    /// Validate the layout and activate the initial recipient(s).
    pub fn send(
        &mut self,
        policy: &TokenPolicy,
        now: DateTime<Utc>,
    ) -> SigningResult<Vec<EnvelopeEvent>> {
        if self.status != EnvelopeStatus::Draft {
            return Err(SigningError::conflict(format!(
                "envelope {} is {}, only drafts can be sent",
                self.id, self.status
            )));
        }
        if self.recipients.is_empty() {
            return Err(SigningError::IncompleteLayout(
                "envelope has no recipients".into(),
            ));
        }
        if !self
            .recipients
            .iter()
            .any(|r| r.role == RecipientRole::Signer)
        {
            return Err(SigningError::IncompleteLayout(
                "envelope has no signer".into(),
            ));
        }
        if let Some(signer) = self.recipients.iter().find(|r| {
            r.role == RecipientRole::Signer && !self.fields.has_kind_for(r.id, FieldKind::Signature)
        }) {
            return Err(SigningError::IncompleteLayout(format!(
                "signer {} has no signature field",
                signer.contact.email
            )));
        }
        for field in self.fields.iter() {
            self.check_page(field.position.page)?;
        }
        if self.deadline_passed(now) {
            return Err(SigningError::validation("expiry deadline has already passed"));
        }

        self.status = EnvelopeStatus::Sent;
        self.sent_at = Some(now);
        let mut events = vec![EnvelopeEvent::EnvelopeSent {
            envelope_id: self.id,
            at: now,
        }];
        self.advance(policy, now, &mut events);
        Ok(events)
    }

    /// First access by a recipient. Repeated calls are no-ops.
    pub fn open(
        &mut self,
        recipient_id: RecipientId,
        now: DateTime<Utc>,
    ) -> SigningResult<Vec<EnvelopeEvent>> {
        let mut events = Vec::new();
        self.mark_opened(recipient_id, now, &mut events)?;
        Ok(events)
    }

    pub fn fill_field(
        &mut self,
        recipient_id: RecipientId,
        field_id: FieldId,
        input: &FieldInput,
        now: DateTime<Utc>,
    ) -> SigningResult<Vec<EnvelopeEvent>> {
        self.guard_actor(recipient_id, now)?;
        let field = self
            .fields
            .get(field_id)
            .ok_or_else(|| SigningError::not_found(format!("field {}", field_id)))?;
        if field.recipient_id != recipient_id {
            return Err(SigningError::forbidden(format!(
                "field {} belongs to another recipient",
                field_id
            )));
        }
        let value = validate_input(field, input)?;

        let mut events = Vec::new();
        self.mark_opened(recipient_id, now, &mut events)?;
        if let Some(field) = self.fields.get_mut(field_id) {
            field.value = Some(value);
            field.filled_at = Some(now);
        }
        events.push(EnvelopeEvent::FieldFilled {
            envelope_id: self.id,
            recipient_id,
            field_id,
            at: now,
        });
        Ok(events)
    }

    /// Sign or approve on behalf of `recipient_id` and advance routing.
    ///
    /// `record` is the signature already appended for this action; its id is
    /// written into the recipient's signature and initials fields.
    pub fn record_completion(
        &mut self,
        recipient_id: RecipientId,
        record: &SignatureRecord,
        policy: &TokenPolicy,
        now: DateTime<Utc>,
    ) -> SigningResult<Vec<EnvelopeEvent>> {
        self.guard_actor(recipient_id, now)?;
        if record.envelope_id != self.id || record.recipient_id != recipient_id {
            return Err(SigningError::validation(
                "signature record belongs to another recipient",
            ));
        }
        let missing = self.fields.unsatisfied_required(recipient_id);
        if !missing.is_empty() {
            let ids: Vec<String> = missing.iter().map(|f| f.id.to_string()).collect();
            return Err(SigningError::validation(format!(
                "required fields not filled: {}",
                ids.join(", ")
            )));
        }

        let mut events = Vec::new();
        self.mark_opened(recipient_id, now, &mut events)?;

        for field in self.fields.iter_mut_for(recipient_id) {
            if field.kind.is_signature_like() {
                field.value = Some(FieldValue::Signature(record.id));
                field.filled_at = Some(now);
            }
        }

        let status = {
            let recipient = self.recipient_mut(recipient_id)?;
            let status = recipient.role.success_status();
            recipient.status = status;
            recipient.completed_at = Some(now);
            recipient.signature_id = Some(record.id);
            status
        };
        events.push(EnvelopeEvent::RecipientCompleted {
            envelope_id: self.id,
            recipient_id,
            status,
            signature_id: record.id,
            at: now,
        });
        if self.status == EnvelopeStatus::Sent {
            self.status = EnvelopeStatus::InProgress;
        }
        self.advance(policy, now, &mut events);
        Ok(events)
    }

    /// Decline on behalf of `recipient_id`; the whole envelope stops.
    pub fn decline(
        &mut self,
        recipient_id: RecipientId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> SigningResult<Vec<EnvelopeEvent>> {
        self.guard_actor(recipient_id, now)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SigningError::validation("a decline reason is required"));
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(SigningError::validation(format!(
                "decline reason longer than {} characters",
                MAX_REASON_LEN
            )));
        }

        let mut events = Vec::new();
        self.mark_opened(recipient_id, now, &mut events)?;
        {
            let recipient = self.recipient_mut(recipient_id)?;
            recipient.status = RecipientStatus::Declined;
            recipient.declined_at = Some(now);
            recipient.decline_reason = Some(reason.to_string());
        }
        self.status = EnvelopeStatus::Declined;
        self.declined_at = Some(now);

        events.push(EnvelopeEvent::RecipientDeclined {
            envelope_id: self.id,
            recipient_id,
            reason: reason.to_string(),
            at: now,
        });
        events.push(EnvelopeEvent::EnvelopeDeclined {
            envelope_id: self.id,
            title: self.title.clone(),
            declined_by: recipient_id,
            reason: reason.to_string(),
            recipients: self.contacts(),
            at: now,
        });
        Ok(events)
    }

    /// Cancel a non-terminal envelope.
    ///
    /// Recipients that have not signed, approved or declined are forced to
    /// `EXPIRED`. A draft also loses its whole field layout.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> SigningResult<Vec<EnvelopeEvent>> {
        if self.status.is_terminal() {
            return Err(SigningError::conflict(format!(
                "envelope {} is already {}",
                self.id, self.status
            )));
        }
        let fields_removed = if self.status == EnvelopeStatus::Draft {
            self.fields.clear()
        } else {
            0
        };
        let mut events = self.force_expire_recipients(now);
        self.status = EnvelopeStatus::Cancelled;
        self.cancelled_at = Some(now);
        events.push(EnvelopeEvent::EnvelopeCancelled {
            envelope_id: self.id,
            fields_removed,
            at: now,
        });
        Ok(events)
    }

    /// Issue a fresh token to a recipient whose turn it is, or whose token
    /// ran out while it was their turn. The previous token stops resolving.
    pub fn resend(
        &mut self,
        recipient_id: RecipientId,
        policy: &TokenPolicy,
        now: DateTime<Utc>,
    ) -> SigningResult<Vec<EnvelopeEvent>> {
        if !self.status.is_routing() {
            return Err(SigningError::conflict(format!(
                "envelope {} is {}",
                self.id, self.status
            )));
        }
        if self.deadline_passed(now) {
            return Err(SigningError::Expired(format!(
                "envelope {} has expired",
                self.id
            )));
        }
        let recipient = self
            .recipient(recipient_id)
            .ok_or_else(|| SigningError::not_found(format!("recipient {}", recipient_id)))?;
        match recipient.status {
            RecipientStatus::Sent | RecipientStatus::Opened | RecipientStatus::Expired => {}
            RecipientStatus::Pending => {
                return Err(SigningError::forbidden(
                    "recipient has not been activated yet",
                ))
            }
            s => {
                return Err(SigningError::conflict(format!(
                    "recipient {} already finished with status {}",
                    recipient_id, s
                )))
            }
        }

        let envelope_id = self.id;
        let recipient = self.recipient_mut(recipient_id)?;
        let grant = policy.issue(now);
        recipient.status = RecipientStatus::Sent;
        recipient.sent_at = Some(now);
        recipient.grant = Some(grant.clone());
        let event = if recipient.role == RecipientRole::Cc {
            EnvelopeEvent::CcNotified {
                envelope_id,
                recipient_id,
                contact: recipient.contact.clone(),
                token: grant.token,
            }
        } else {
            EnvelopeEvent::RecipientActivated {
                envelope_id,
                recipient_id,
                role: recipient.role,
                contact: recipient.contact.clone(),
                token: grant.token,
                expires_at: grant.expires_at,
                resend: true,
            }
        };
        Ok(vec![event])
    }

    // ── Expiry ───────────────────────────────────────────────────────

    /// Mark active recipients whose token ran out as `EXPIRED`. The envelope
    /// itself stays open so the owner can resend.
    pub fn expire_tokens(&mut self, now: DateTime<Utc>) -> Vec<EnvelopeEvent> {
        if !self.status.is_routing() {
            return Vec::new();
        }
        let mut events = Vec::new();
        for r in self.recipients.iter_mut() {
            if r.role.is_actionable() && r.status.is_active() && r.token_expired_at(now) {
                r.status = RecipientStatus::Expired;
                events.push(EnvelopeEvent::RecipientExpired {
                    envelope_id: self.id,
                    recipient_id: r.id,
                    at: now,
                });
            }
        }
        events
    }

    /// Expire the whole envelope once its deadline has passed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> SigningResult<Vec<EnvelopeEvent>> {
        if self.status.is_terminal() {
            return Err(SigningError::conflict(format!(
                "envelope {} is already {}",
                self.id, self.status
            )));
        }
        if !self.deadline_passed(now) {
            return Err(SigningError::conflict(format!(
                "envelope {} has not reached its deadline",
                self.id
            )));
        }
        let mut events = self.force_expire_recipients(now);
        self.status = EnvelopeStatus::Expired;
        self.expired_at = Some(now);
        events.push(EnvelopeEvent::EnvelopeExpired {
            envelope_id: self.id,
            at: now,
        });
        Ok(events)
    }

    /// One expiry pass: the envelope deadline first, then recipient tokens.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<EnvelopeEvent> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        if self.deadline_passed(now) {
            return self.expire(now).unwrap_or_default();
        }
        self.expire_tokens(now)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn guard_actor(&self, recipient_id: RecipientId, now: DateTime<Utc>) -> SigningResult<()> {
        let recipient = self
            .recipient(recipient_id)
            .ok_or_else(|| SigningError::not_found(format!("recipient {}", recipient_id)))?;
        check_can_act(self, recipient, now)
    }

    fn recipient_mut(
        &mut self,
        recipient_id: RecipientId,
    ) -> SigningResult<&mut envelope_types::Recipient> {
        self.recipients
            .iter_mut()
            .find(|r| r.id == recipient_id)
            .ok_or_else(|| SigningError::not_found(format!("recipient {}", recipient_id)))
    }

    fn mark_opened(
        &mut self,
        recipient_id: RecipientId,
        now: DateTime<Utc>,
        events: &mut Vec<EnvelopeEvent>,
    ) -> SigningResult<()> {
        let envelope_id = self.id;
        let recipient = self.recipient_mut(recipient_id)?;
        if recipient.status != RecipientStatus::Sent {
            return Ok(());
        }
        recipient.status = RecipientStatus::Opened;
        recipient.opened_at = Some(now);
        let actionable = recipient.role.is_actionable();
        events.push(EnvelopeEvent::RecipientOpened {
            envelope_id,
            recipient_id,
            at: now,
        });
        if actionable && self.status == EnvelopeStatus::Sent {
            self.status = EnvelopeStatus::InProgress;
        }
        Ok(())
    }

    /// Apply the routing plan: activate, copy in CCs, complete.
    fn advance(&mut self, policy: &TokenPolicy, now: DateTime<Utc>, events: &mut Vec<EnvelopeEvent>) {
        let plan = self.routing().plan(&self.recipients);
        for warning in &plan.warnings {
            let ids: Vec<String> = warning.recipients.iter().map(|id| id.to_string()).collect();
            tracing::warn!(
                envelope = %self.id,
                order = warning.order,
                recipients = %ids.join(","),
                "Recipients share a routing order; breaking the tie on identifier"
            );
        }

        let envelope_id = self.id;
        for r in self.recipients.iter_mut() {
            let activate = plan.activate.contains(&r.id);
            let copy_in = plan.notify_cc.contains(&r.id);
            if !activate && !copy_in {
                continue;
            }
            let grant = policy.issue(now);
            r.status = RecipientStatus::Sent;
            r.sent_at = Some(now);
            r.grant = Some(grant.clone());
            if activate {
                events.push(EnvelopeEvent::RecipientActivated {
                    envelope_id,
                    recipient_id: r.id,
                    role: r.role,
                    contact: r.contact.clone(),
                    token: grant.token,
                    expires_at: grant.expires_at,
                    resend: false,
                });
            } else {
                events.push(EnvelopeEvent::CcNotified {
                    envelope_id,
                    recipient_id: r.id,
                    contact: r.contact.clone(),
                    token: grant.token,
                });
            }
        }

        if plan.complete && self.status != EnvelopeStatus::Completed {
            self.status = EnvelopeStatus::Completed;
            self.completed_at = Some(now);
            events.push(EnvelopeEvent::EnvelopeCompleted {
                envelope_id,
                title: self.title.clone(),
                recipients: self.contacts(),
                at: now,
            });
        }
    }

    fn force_expire_recipients(&mut self, now: DateTime<Utc>) -> Vec<EnvelopeEvent> {
        let mut events = Vec::new();
        for r in self.recipients.iter_mut() {
            if r.status.is_success()
                || r.status == RecipientStatus::Declined
                || r.status == RecipientStatus::Expired
            {
                continue;
            }
            r.status = RecipientStatus::Expired;
            events.push(EnvelopeEvent::RecipientExpired {
                envelope_id: self.id,
                recipient_id: r.id,
                at: now,
            });
        }
        events
    }

    fn contacts(&self) -> Vec<ContactInfo> {
        self.recipients.iter().map(|r| r.contact.clone()).collect()
    }
}
