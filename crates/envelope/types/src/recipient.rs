//! Recipients: the parties routed through an envelope.

use crate::{RecipientId, SignatureId, TokenGrant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a recipient is asked to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientRole {
    Signer,
    Reviewer,
    Approver,
    /// Receives copies; never blocks progression.
    Cc,
}

impl RecipientRole {
    /// Roles whose completion gates the envelope.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, RecipientRole::Cc)
    }

    /// Status a successful completion lands on.
    pub fn success_status(&self) -> RecipientStatus {
        match self {
            RecipientRole::Signer => RecipientStatus::Signed,
            RecipientRole::Reviewer | RecipientRole::Approver | RecipientRole::Cc => {
                RecipientStatus::Approved
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecipientRole::Signer => "Signer",
            RecipientRole::Reviewer => "Reviewer",
            RecipientRole::Approver => "Approver",
            RecipientRole::Cc => "CC",
        }
    }
}

/// Per-recipient lifecycle.
///
/// `Pending → Sent → Opened → {Signed | Approved | Declined | Expired}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Opened,
    Signed,
    Approved,
    Declined,
    Expired,
}

impl RecipientStatus {
    /// Holding the turn: notified and not yet finished.
    pub fn is_active(&self) -> bool {
        matches!(self, RecipientStatus::Sent | RecipientStatus::Opened)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecipientStatus::Signed | RecipientStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecipientStatus::Signed
                | RecipientStatus::Approved
                | RecipientStatus::Declined
                | RecipientStatus::Expired
        )
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecipientStatus::Pending => "PENDING",
            RecipientStatus::Sent => "SENT",
            RecipientStatus::Opened => "OPENED",
            RecipientStatus::Signed => "SIGNED",
            RecipientStatus::Approved => "APPROVED",
            RecipientStatus::Declined => "DECLINED",
            RecipientStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Contact details handed to the notification collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
}

/// A recipient as stored inside its envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    /// Position in the routing order. Only meaningful for sequential envelopes.
    pub order: u32,
    pub role: RecipientRole,
    pub contact: ContactInfo,
    pub status: RecipientStatus,
    /// Present once the recipient has been activated.
    pub grant: Option<TokenGrant>,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<SignatureId>,
}

impl Recipient {
    pub fn new(spec: NewRecipient) -> Self {
        Self {
            id: RecipientId::generate(),
            order: spec.order,
            role: spec.role,
            contact: ContactInfo {
                name: spec.name,
                email: spec.email,
            },
            status: RecipientStatus::Pending,
            grant: None,
            sent_at: None,
            opened_at: None,
            completed_at: None,
            declined_at: None,
            decline_reason: None,
            signature_id: None,
        }
    }

    pub fn token_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.grant
            .as_ref()
            .map(|g| g.is_expired_at(now))
            .unwrap_or(false)
    }

    /// Public projection with the token stripped.
    pub fn public_view(&self) -> RecipientSummary {
        RecipientSummary {
            id: self.id,
            order: self.order,
            role: self.role,
            name: self.contact.name.clone(),
            email: self.contact.email.clone(),
            status: self.status,
            token_expires_at: self.grant.as_ref().map(|g| g.expires_at),
            completed_at: self.completed_at,
        }
    }
}

/// Request payload for adding a recipient to a draft.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRecipient {
    #[serde(default)]
    pub order: u32,
    pub role: RecipientRole,
    pub name: String,
    pub email: String,
}

/// Token-free view of a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSummary {
    pub id: RecipientId,
    pub order: u32,
    pub role: RecipientRole,
    pub name: String,
    pub email: String,
    pub status: RecipientStatus,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
