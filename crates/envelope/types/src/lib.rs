//! Envelope Domain Types
//!
//! An **envelope** routes one document through a set of recipients for
//! electronic signature. This crate holds the vocabulary shared by every
//! other envelope crate; it contains no behaviour beyond validation of
//! individual values.
//!
//! # Key Concepts
//!
//! - **Recipient**: a party with a role, an order, a capability token and a
//!   status.
//! - **Field**: a typed region placed on a page in percentage coordinates.
//! - **CapabilityToken**: opaque high-entropy string granting one recipient
//!   time-boxed access.
//! - **SignatureRecord**: immutable evidence of a signing or approval event.
//! - **RenderedOutput**: the final document with overlays and certificate.
//! - **EnvelopeEvent**: emitted after each committed transition.

#![deny(unsafe_code)]

mod error;
mod event;
mod field;
mod ids;
mod recipient;
mod rendered;
mod signature;
mod status;
mod token;

pub use error::*;
pub use event::*;
pub use field::*;
pub use ids::*;
pub use recipient::*;
pub use rendered::*;
pub use signature::*;
pub use status::*;
pub use token::*;
