//! Envelope Service
//!
//! Orchestrates the signing workflow around the synchronous engine:
//!
//! - [`EnvelopeService`]: every owner and token operation. Transitions on one
//!   envelope are serialised by a per-envelope lock and persisted with a
//!   versioned write; events are dispatched only after the write lands.
//! - [`NotificationQueue`]: fire-and-forget delivery through a [`Notifier`].
//! - [`RenderQueue`]: background rendering of completed envelopes with
//!   bounded retries.
//! - [`spawn_expiry_sweeper`]: periodic token and deadline expiry.
//! - [`Clock`]: injectable time source; tests drive a [`ManualClock`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod clock;
pub mod config;
pub mod locks;
pub mod notify;
pub mod render_queue;
pub mod service;
mod shared;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ExpiryConfig, NotificationConfig, RenderConfig, ServiceConfig, TokenConfig};
pub use locks::EnvelopeLocks;
pub use notify::{
    notifications_for, templates, LoggingNotifier, Notification, NotificationQueue, Notifier,
    NotifyError, RecordingNotifier, SentNotification,
};
pub use render_queue::{FailedRender, RenderQueue, PDF_CONTENT_TYPE};
pub use service::{Completion, EnvelopeService, ServiceComponents, SweepReport, UploadedDocument};
pub use sweeper::spawn_expiry_sweeper;
