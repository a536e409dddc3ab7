//! Notification collaborator and its fire-and-forget dispatch queue.
//!
//! Transitions never wait on delivery: events are turned into
//! [`Notification`]s after commit and pushed onto a bounded queue drained by
//! one background task. A full queue or a failing notifier is logged and the
//! notification dropped.

use async_trait::async_trait;
use envelope_types::{EnvelopeEvent, EnvelopeId, SigningError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Template identifiers passed to the notifier.
pub mod templates {
    pub const RECIPIENT_ACTIVATED: &str = "recipient_activated";
    pub const CC_NOTIFIED: &str = "cc_notified";
    pub const ENVELOPE_COMPLETED: &str = "envelope_completed";
    pub const ENVELOPE_DECLINED: &str = "envelope_declined";
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("address rejected: {0}")]
    Rejected(String),
}

impl From<NotifyError> for SigningError {
    fn from(err: NotifyError) -> Self {
        SigningError::Storage(err.to_string())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, address: &str, template: &str, data: &Value) -> Result<(), NotifyError>;
}

/// One message for one address.
#[derive(Clone, Debug)]
pub struct Notification {
    pub envelope_id: EnvelopeId,
    pub address: String,
    pub template: &'static str,
    pub data: Value,
}

/// The notifications a committed event calls for.
pub fn notifications_for(event: &EnvelopeEvent) -> Vec<Notification> {
    match event {
        EnvelopeEvent::RecipientActivated {
            envelope_id,
            recipient_id,
            role,
            contact,
            token,
            expires_at,
            resend,
        } => vec![Notification {
            envelope_id: *envelope_id,
            address: contact.email.clone(),
            template: templates::RECIPIENT_ACTIVATED,
            data: json!({
                "envelope_id": envelope_id,
                "recipient_id": recipient_id,
                "name": contact.name,
                "role": role.label(),
                "token": token.as_str(),
                "expires_at": expires_at,
                "resend": resend,
            }),
        }],
        EnvelopeEvent::CcNotified {
            envelope_id,
            recipient_id,
            contact,
            token,
        } => vec![Notification {
            envelope_id: *envelope_id,
            address: contact.email.clone(),
            template: templates::CC_NOTIFIED,
            data: json!({
                "envelope_id": envelope_id,
                "recipient_id": recipient_id,
                "name": contact.name,
                "token": token.as_str(),
            }),
        }],
        EnvelopeEvent::EnvelopeCompleted {
            envelope_id,
            title,
            recipients,
            at,
        } => recipients
            .iter()
            .map(|contact| Notification {
                envelope_id: *envelope_id,
                address: contact.email.clone(),
                template: templates::ENVELOPE_COMPLETED,
                data: json!({
                    "envelope_id": envelope_id,
                    "title": title,
                    "name": contact.name,
                    "completed_at": at,
                }),
            })
            .collect(),
        EnvelopeEvent::EnvelopeDeclined {
            envelope_id,
            title,
            declined_by,
            reason,
            recipients,
            at,
        } => recipients
            .iter()
            .map(|contact| Notification {
                envelope_id: *envelope_id,
                address: contact.email.clone(),
                template: templates::ENVELOPE_DECLINED,
                data: json!({
                    "envelope_id": envelope_id,
                    "title": title,
                    "name": contact.name,
                    "declined_by": declined_by,
                    "reason": reason,
                    "declined_at": at,
                }),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Bounded queue in front of a [`Notifier`].
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    /// Spawn the delivery task. Must be called inside a Tokio runtime.
    pub fn start(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(n) = rx.recv().await {
                match notifier.notify(&n.address, n.template, &n.data).await {
                    Ok(()) => tracing::debug!(
                        envelope = %n.envelope_id,
                        template = n.template,
                        "notification delivered"
                    ),
                    Err(e) => tracing::warn!(
                        envelope = %n.envelope_id,
                        template = n.template,
                        error = %e,
                        "notification failed"
                    ),
                }
            }
            tracing::debug!("notification queue closed");
        });
        (Self { tx }, handle)
    }

    /// Queue without waiting. Never fails the caller.
    pub fn enqueue(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => tracing::warn!(
                envelope = %n.envelope_id,
                template = n.template,
                "notification queue full, dropping"
            ),
            Err(TrySendError::Closed(n)) => tracing::warn!(
                envelope = %n.envelope_id,
                template = n.template,
                "notification queue closed, dropping"
            ),
        }
    }
}

/// Writes each notification to the log. Tokens are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, address: &str, template: &str, data: &Value) -> Result<(), NotifyError> {
        tracing::info!(
            address,
            template,
            envelope = %data.get("envelope_id").cloned().unwrap_or(serde_json::Value::Null),
            "notification sent"
        );
        Ok(())
    }
}

/// A delivered notification as seen by [`RecordingNotifier`].
#[derive(Clone, Debug, PartialEq)]
pub struct SentNotification {
    pub address: String,
    pub template: String,
    pub data: Value,
}

/// Keeps every notification in memory. Can be told to fail so callers can
/// check that delivery errors stay contained.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Notifications sent to `address` with `template`.
    pub fn sent_to(&self, address: &str, template: &str) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|n| n.address == address && n.template == template)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, address: &str, template: &str, data: &Value) -> Result<(), NotifyError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(NotifyError::Delivery(format!("{} unreachable", address)));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Delivery("recorder lock poisoned".to_string()))?
            .push(SentNotification {
                address: address.to_string(),
                template: template.to_string(),
                data: data.clone(),
            });
        Ok(())
    }
}
