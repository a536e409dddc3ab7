//! Envelope ledger: the signature record store and the audit trail.
//!
//! - Signature records are append-only. Each carries a BLAKE3 hash of its
//!   canonical content; [`verify_signature`] recomputes it.
//! - Audit records form one hash chain per envelope, each record storing the
//!   hash of its predecessor. Appends are a side effect of committed
//!   transitions, never a precondition for them.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
mod hashing;
pub mod memory;
mod model;
mod traits;

pub use error::{LedgerError, LedgerResult};
pub use hashing::{signature_hash, verify_signature};
pub use memory::InMemoryLedger;
pub use model::{AuditAppend, AuditRecord, ChainVerification, NewSignature};
pub use traits::{AuditTrail, SignatureStore};
