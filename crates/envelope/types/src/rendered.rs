//! The final artifact produced once an envelope completes.

use crate::{DocumentKey, EnvelopeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to the rendered document held by the storage collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedOutput {
    pub key: DocumentKey,
    pub url: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the rendered bytes.
    pub content_hash: String,
    pub certificate: CertificateSummary,
    pub rendered_at: DateTime<Utc>,
}

impl RenderedOutput {
    /// Two outputs describe the same artifact when their bytes hash equal.
    pub fn same_artifact(&self, other: &RenderedOutput) -> bool {
        self.content_hash == other.content_hash && self.key == other.key
    }
}

/// What the appended certificate page attests to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub envelope_id: EnvelopeId,
    pub document_title: String,
    pub signature_count: usize,
    pub page_count: u32,
}
