//! Asynchronous render jobs.
//!
//! Completion enqueues the envelope id; a job renders off the async runtime,
//! stores the bytes under a content-addressed key and attaches the output to
//! the envelope with a versioned write. At most one job per envelope is in
//! flight. Failed attempts back off exponentially; envelopes that exhaust
//! their attempts land in the failed set until [`RenderQueue::retry`].

use crate::config::RenderConfig;
use crate::shared::Shared;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use envelope_ledger::AuditAppend;
use envelope_render::{RenderInput, Renderer};
use envelope_types::{
    DocumentKey, EnvelopeId, EnvelopeStatus, Field, RenderedOutput, SigningError, SigningResult,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// An envelope whose render gave up.
#[derive(Clone, Debug, Serialize)]
pub struct FailedRender {
    pub envelope_id: EnvelopeId,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Attached,
    AlreadyRendered,
    NotCompleted(EnvelopeStatus),
}

#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    renderer: Arc<Renderer>,
    config: RenderConfig,
    in_flight: DashSet<EnvelopeId>,
    failed: DashMap<EnvelopeId, FailedRender>,
}

impl RenderQueue {
    pub(crate) fn new(shared: Arc<Shared>, config: RenderConfig) -> Self {
        let renderer = Arc::new(Renderer::new(config.options()));
        Self {
            inner: Arc::new(Inner {
                shared,
                renderer,
                config,
                in_flight: DashSet::new(),
                failed: DashMap::new(),
            }),
        }
    }

    /// Start a render job unless one is already running for `id`.
    pub fn enqueue(&self, id: EnvelopeId) -> bool {
        if !self.inner.in_flight.insert(id) {
            tracing::debug!(envelope = %id, "render already in flight");
            return false;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(id).await });
        true
    }

    /// Clear a failed render and start again.
    pub fn retry(&self, id: EnvelopeId) -> bool {
        self.inner.failed.remove(&id);
        self.enqueue(id)
    }

    pub fn is_in_flight(&self, id: EnvelopeId) -> bool {
        self.inner.in_flight.contains(&id)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn failed(&self) -> Vec<FailedRender> {
        let mut out: Vec<FailedRender> = self.inner.failed.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|f| f.failed_at);
        out
    }

    pub fn failure(&self, id: EnvelopeId) -> Option<FailedRender> {
        self.inner.failed.get(&id).map(|e| e.value().clone())
    }
}

impl Inner {
    async fn run(self: Arc<Self>, id: EnvelopeId) {
        let mut attempt = 0u32;
        let mut gave_up = None;
        loop {
            attempt += 1;
            match self.render_once(id).await {
                Ok(outcome) => {
                    self.failed.remove(&id);
                    match outcome {
                        Outcome::Attached => {
                            tracing::info!(envelope = %id, attempt, "rendered output attached")
                        }
                        Outcome::AlreadyRendered => {
                            tracing::debug!(envelope = %id, "envelope already rendered")
                        }
                        Outcome::NotCompleted(status) => {
                            tracing::debug!(envelope = %id, status = %status, "envelope not renderable")
                        }
                    }
                    break;
                }
                Err(SigningError::NotFound(what)) => {
                    tracing::warn!(envelope = %id, missing = %what, "render abandoned");
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        envelope = %id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "render attempt failed"
                    );
                    if attempt >= self.config.max_attempts {
                        gave_up = Some(FailedRender {
                            envelope_id: id,
                            attempts: attempt,
                            last_error: e.to_string(),
                            failed_at: self.shared.now(),
                        });
                        break;
                    }
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                }
            }
        }
        // A recorded failure implies the job has left the in-flight set.
        self.in_flight.remove(&id);
        if let Some(failure) = gave_up {
            self.failed.insert(id, failure);
        }
    }

    async fn render_once(&self, id: EnvelopeId) -> SigningResult<Outcome> {
        let envelope = self
            .shared
            .repo
            .get(id)
            .await?
            .ok_or_else(|| SigningError::not_found(format!("envelope {}", id)))?;
        if envelope.rendered().is_some() {
            return Ok(Outcome::AlreadyRendered);
        }
        if envelope.status() != EnvelopeStatus::Completed {
            return Ok(Outcome::NotCompleted(envelope.status()));
        }

        let source = self.shared.documents.get(envelope.document_key()).await?;
        let recipients = envelope.recipients().to_vec();
        let mut signatures = self.shared.signatures.list_for_envelope(id).await?;
        signatures.retain(|s| recipients.iter().any(|r| r.signature_id == Some(s.id)));
        let fields: Vec<Field> = envelope.fields().iter().cloned().collect();
        let title = envelope.title().to_string();
        let created_at = envelope.created_at();
        let completed_at = envelope.completed_at().unwrap_or(created_at);

        let renderer = self.renderer.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&RenderInput {
                source: &source,
                envelope_id: id,
                title: &title,
                created_at,
                completed_at,
                fields: &fields,
                recipients: &recipients,
                signatures: &signatures,
            })
        })
        .await
        .map_err(|e| SigningError::RenderFailure(format!("render task aborted: {}", e)))??;

        let key = DocumentKey::new(format!("rendered/{}/{}.pdf", id, rendered.content_hash));
        let size_bytes = rendered.bytes.len() as u64;
        let stored = self
            .shared
            .documents
            .put(rendered.bytes, &key, PDF_CONTENT_TYPE)
            .await?;
        let output = RenderedOutput {
            key: stored.key,
            url: stored.url,
            size_bytes,
            content_hash: rendered.content_hash,
            certificate: rendered.certificate,
            rendered_at: self.shared.now(),
        };

        let _guard = self.shared.locks.acquire(id).await;
        let mut envelope = self
            .shared
            .repo
            .get(id)
            .await?
            .ok_or_else(|| SigningError::not_found(format!("envelope {}", id)))?;
        let version = envelope.version();
        if !envelope.attach_rendered(output.clone())? {
            return Ok(Outcome::AlreadyRendered);
        }
        self.shared.repo.update(envelope, version).await?;
        self.shared
            .record_audit(AuditAppend {
                envelope_id: id,
                timestamp: output.rendered_at,
                actor: "system:render".to_string(),
                stage: "document_rendered".to_string(),
                recipient_id: None,
                message: format!("rendered output stored at {}", output.key),
                payload: json!({
                    "key": output.key,
                    "content_hash": output.content_hash,
                    "size_bytes": output.size_bytes,
                    "page_count": output.certificate.page_count,
                }),
            })
            .await;
        Ok(Outcome::Attached)
    }
}
