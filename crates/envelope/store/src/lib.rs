//! Envelope storage.
//!
//! Two concerns live here:
//! - [`EnvelopeRepository`]: persistence of the envelope aggregate with an
//!   optimistic version check on every write and a capability-token index.
//! - [`DocumentStorage`]: the storage collaborator holding source documents
//!   and rendered output. [`InMemoryDocumentStorage`] and
//!   [`LocalDocumentStorage`] are provided.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod documents;
mod error;
mod repository;

pub use documents::{
    validate_key, DocumentStorage, InMemoryDocumentStorage, LocalDocumentStorage, StoredObject,
};
pub use error::{StorageError, StorageResult};
pub use repository::{EnvelopeRepository, InMemoryEnvelopeRepository};
