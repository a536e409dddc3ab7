//! Token-gated access.
//!
//! [`authorize`] is the single guard every token-driven entry point goes
//! through. The checks run in a fixed order so the error a caller sees is
//! stable: unknown token, then expiry, then replay, then envelope state, then
//! turn.

use crate::envelope::Envelope;
use chrono::{DateTime, Utc};
use envelope_types::{
    CapabilityToken, EnvelopeId, EnvelopeStatus, Field, Recipient, RecipientRole,
    RecipientStatus, RecipientSummary, SigningError, SigningResult, WorkflowType,
};
use serde::Serialize;

/// What the token holder wants to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Read the recipient's projection of the envelope.
    View,
    /// Fill, sign, approve or decline.
    Act,
}

/// Resolve `token` to its recipient and check that `access` is allowed now.
pub fn authorize<'a>(
    envelope: &'a Envelope,
    token: &CapabilityToken,
    access: Access,
    now: DateTime<Utc>,
) -> SigningResult<&'a Recipient> {
    let recipient = envelope
        .recipient_by_token(token)
        .ok_or_else(|| SigningError::not_found("capability token"))?;
    check_not_expired(envelope, recipient, now)?;
    if access == Access::Act {
        check_can_act(envelope, recipient, now)?;
    }
    Ok(recipient)
}

fn check_not_expired(
    envelope: &Envelope,
    recipient: &Recipient,
    now: DateTime<Utc>,
) -> SigningResult<()> {
    if recipient.token_expired_at(now) || recipient.status == RecipientStatus::Expired {
        return Err(SigningError::Expired(format!(
            "access for recipient {} has expired",
            recipient.id
        )));
    }
    if envelope.deadline_passed(now) || envelope.status() == EnvelopeStatus::Expired {
        return Err(SigningError::Expired(format!(
            "envelope {} has expired",
            envelope.id()
        )));
    }
    Ok(())
}

/// Full guard for mutating actions by a resolved recipient.
pub(crate) fn check_can_act(
    envelope: &Envelope,
    recipient: &Recipient,
    now: DateTime<Utc>,
) -> SigningResult<()> {
    check_not_expired(envelope, recipient, now)?;
    if recipient.status.is_success() || recipient.status == RecipientStatus::Declined {
        return Err(SigningError::conflict(format!(
            "recipient {} already finished with status {}",
            recipient.id, recipient.status
        )));
    }
    match envelope.status() {
        EnvelopeStatus::Draft => {
            return Err(SigningError::forbidden("envelope has not been sent"));
        }
        s if s.is_terminal() => {
            return Err(SigningError::conflict(format!(
                "envelope {} is {}",
                envelope.id(),
                s
            )));
        }
        _ => {}
    }
    if recipient.role == RecipientRole::Cc {
        return Err(SigningError::forbidden("CC recipients cannot act"));
    }
    if !envelope.routing().is_active(envelope.recipients(), recipient.id) {
        let reason = match envelope.workflow() {
            WorkflowType::Sequential => "not your turn",
            WorkflowType::Parallel => "recipient has not been activated",
        };
        return Err(SigningError::forbidden(reason));
    }
    Ok(())
}

/// What a token holder sees.
#[derive(Clone, Debug, Serialize)]
pub struct RecipientView {
    pub envelope_id: EnvelopeId,
    pub title: String,
    pub envelope_status: EnvelopeStatus,
    pub workflow: WorkflowType,
    pub recipient: RecipientSummary,
    /// Only the fields bound to this recipient.
    pub fields: Vec<Field>,
    pub can_act: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RecipientView {
    pub fn build(envelope: &Envelope, recipient: &Recipient, now: DateTime<Utc>) -> Self {
        Self {
            envelope_id: envelope.id(),
            title: envelope.title().to_string(),
            envelope_status: envelope.status(),
            workflow: envelope.workflow(),
            recipient: recipient.public_view(),
            fields: envelope
                .fields()
                .for_recipient(recipient.id)
                .into_iter()
                .cloned()
                .collect(),
            can_act: check_can_act(envelope, recipient, now).is_ok(),
            expires_at: envelope.expires_at(),
        }
    }
}
