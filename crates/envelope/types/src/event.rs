//! Events emitted by the state machine after a transition commits.
//!
//! Notification dispatch, audit and render scheduling all hang off these; a
//! transition never waits on any of them.

use crate::{
    CapabilityToken, ContactInfo, EnvelopeId, FieldId, RecipientId, RecipientRole,
    RecipientStatus, SignatureId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EnvelopeEvent {
    EnvelopeSent {
        envelope_id: EnvelopeId,
        at: DateTime<Utc>,
    },
    /// A recipient got the turn (or a fresh token on resend).
    RecipientActivated {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        role: RecipientRole,
        contact: ContactInfo,
        #[serde(skip_serializing)]
        token: CapabilityToken,
        expires_at: DateTime<Utc>,
        resend: bool,
    },
    /// A CC recipient was copied in; they never hold the turn.
    CcNotified {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        contact: ContactInfo,
        #[serde(skip_serializing)]
        token: CapabilityToken,
    },
    RecipientOpened {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        at: DateTime<Utc>,
    },
    FieldFilled {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        field_id: FieldId,
        at: DateTime<Utc>,
    },
    RecipientCompleted {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        status: RecipientStatus,
        signature_id: SignatureId,
        at: DateTime<Utc>,
    },
    RecipientDeclined {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        reason: String,
        at: DateTime<Utc>,
    },
    RecipientExpired {
        envelope_id: EnvelopeId,
        recipient_id: RecipientId,
        at: DateTime<Utc>,
    },
    EnvelopeCompleted {
        envelope_id: EnvelopeId,
        title: String,
        recipients: Vec<ContactInfo>,
        at: DateTime<Utc>,
    },
    EnvelopeDeclined {
        envelope_id: EnvelopeId,
        title: String,
        declined_by: RecipientId,
        reason: String,
        recipients: Vec<ContactInfo>,
        at: DateTime<Utc>,
    },
    EnvelopeCancelled {
        envelope_id: EnvelopeId,
        fields_removed: usize,
        at: DateTime<Utc>,
    },
    EnvelopeExpired {
        envelope_id: EnvelopeId,
        at: DateTime<Utc>,
    },
}

impl EnvelopeEvent {
    pub fn envelope_id(&self) -> EnvelopeId {
        match self {
            EnvelopeEvent::EnvelopeSent { envelope_id, .. }
            | EnvelopeEvent::RecipientActivated { envelope_id, .. }
            | EnvelopeEvent::CcNotified { envelope_id, .. }
            | EnvelopeEvent::RecipientOpened { envelope_id, .. }
            | EnvelopeEvent::FieldFilled { envelope_id, .. }
            | EnvelopeEvent::RecipientCompleted { envelope_id, .. }
            | EnvelopeEvent::RecipientDeclined { envelope_id, .. }
            | EnvelopeEvent::RecipientExpired { envelope_id, .. }
            | EnvelopeEvent::EnvelopeCompleted { envelope_id, .. }
            | EnvelopeEvent::EnvelopeDeclined { envelope_id, .. }
            | EnvelopeEvent::EnvelopeCancelled { envelope_id, .. }
            | EnvelopeEvent::EnvelopeExpired { envelope_id, .. } => *envelope_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnvelopeEvent::EnvelopeSent { .. } => "envelope_sent",
            EnvelopeEvent::RecipientActivated { .. } => "recipient_activated",
            EnvelopeEvent::CcNotified { .. } => "cc_notified",
            EnvelopeEvent::RecipientOpened { .. } => "recipient_opened",
            EnvelopeEvent::FieldFilled { .. } => "field_filled",
            EnvelopeEvent::RecipientCompleted { .. } => "recipient_completed",
            EnvelopeEvent::RecipientDeclined { .. } => "recipient_declined",
            EnvelopeEvent::RecipientExpired { .. } => "recipient_expired",
            EnvelopeEvent::EnvelopeCompleted { .. } => "envelope_completed",
            EnvelopeEvent::EnvelopeDeclined { .. } => "envelope_declined",
            EnvelopeEvent::EnvelopeCancelled { .. } => "envelope_cancelled",
            EnvelopeEvent::EnvelopeExpired { .. } => "envelope_expired",
        }
    }

    /// Recipient the event is about, if any.
    pub fn recipient_id(&self) -> Option<RecipientId> {
        match self {
            EnvelopeEvent::RecipientActivated { recipient_id, .. }
            | EnvelopeEvent::CcNotified { recipient_id, .. }
            | EnvelopeEvent::RecipientOpened { recipient_id, .. }
            | EnvelopeEvent::FieldFilled { recipient_id, .. }
            | EnvelopeEvent::RecipientCompleted { recipient_id, .. }
            | EnvelopeEvent::RecipientDeclined { recipient_id, .. }
            | EnvelopeEvent::RecipientExpired { recipient_id, .. } => Some(*recipient_id),
            EnvelopeEvent::EnvelopeDeclined { declined_by, .. } => Some(*declined_by),
            _ => None,
        }
    }
}
