//! Envelope Engine
//!
//! The synchronous core of the signing workflow. Nothing in this crate
//! performs I/O: every operation takes the current time explicitly, mutates an
//! in-memory [`Envelope`] and returns the [`EnvelopeEvent`]s it produced.
//!
//! # Components
//!
//! - [`Envelope`]: the aggregate root. Owns the recipient directory and the
//!   [`FieldLayout`]; drafts are edited through its methods.
//! - State machine ([`machine`]): `send`, `open`, `fill_field`,
//!   `record_completion`, `decline`, `cancel`, `resend` and the expiry
//!   transitions.
//! - [`RoutingEngine`]: pure function of workflow type and recipient statuses
//!   deciding who holds the turn. There is no step counter.
//! - [`authorize`]: the token guard shared by every token-driven entry point.
//! - Fill engine ([`fill`]): type-directed validation of submitted values.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use envelope_engine::{Envelope, LayoutField, NewEnvelope, TokenPolicy};
//! use envelope_types::*;
//!
//! let mut envelope = Envelope::create(
//!     NewEnvelope {
//!         title: "Offer letter".into(),
//!         document_key: DocumentKey::new("documents/offer.pdf"),
//!         workflow: WorkflowType::Sequential,
//!         recipients: vec![NewRecipient {
//!             order: 1,
//!             role: RecipientRole::Signer,
//!             name: "Grace Hopper".into(),
//!             email: "grace@example.com".into(),
//!         }],
//!         fields: vec![LayoutField {
//!             recipient: 0,
//!             kind: FieldKind::Signature,
//!             position: FieldPosition { page: 1, x: 10.0, y: 80.0, width: 30.0, height: 8.0 },
//!             required: true,
//!             label: None,
//!             constraints: FieldConstraints::default(),
//!         }],
//!         expires_at: None,
//!     },
//!     &Actor::new("acme", "hr-bot"),
//!     Utc::now(),
//! )
//! .unwrap();
//!
//! let events = envelope.send(&TokenPolicy::default(), Utc::now()).unwrap();
//! assert_eq!(envelope.status(), EnvelopeStatus::Sent);
//! assert!(events.iter().any(|e| e.name() == "recipient_activated"));
//! ```

#![deny(unsafe_code)]

pub mod access;
pub mod envelope;
pub mod fill;
pub mod layout;
pub mod machine;
pub mod routing;

pub use access::{authorize, Access, RecipientView};
pub use envelope::{Envelope, EnvelopeSummary, LayoutField, NewEnvelope};
pub use envelope_types::EnvelopeEvent;
pub use fill::{validate_input, FieldInput};
pub use layout::FieldLayout;
pub use machine::TokenPolicy;
pub use routing::{IntegrityWarning, RoutingEngine, RoutingPlan};
