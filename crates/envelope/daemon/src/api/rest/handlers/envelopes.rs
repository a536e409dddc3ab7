//! Envelope owner handlers

use crate::api::rest::actor::OwnerActor;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use envelope_engine::{EnvelopeSummary, NewEnvelope};
use envelope_ledger::{AuditRecord, ChainVerification};
use envelope_service::{FailedRender, PDF_CONTENT_TYPE};
use envelope_types::{EnvelopeId, FieldId, NewField, NewRecipient, RecipientId, SignatureRecord};
use serde::Serialize;

/// Create a draft envelope
pub async fn create_envelope(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Json(request): Json<NewEnvelope>,
) -> ApiResult<(StatusCode, Json<EnvelopeSummary>)> {
    let summary = state.service.create_envelope(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// List the tenant's envelopes
pub async fn list_envelopes(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
) -> ApiResult<Json<Vec<EnvelopeSummary>>> {
    Ok(Json(state.service.list_envelopes(&actor).await?))
}

/// Get one envelope
pub async fn get_envelope(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<Json<EnvelopeSummary>> {
    Ok(Json(state.service.get_envelope(&actor, id).await?))
}

/// Delete a draft
pub async fn delete_envelope(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<StatusCode> {
    state.service.delete_draft(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Id of a newly created child resource
#[derive(Debug, Serialize)]
pub struct CreatedResponse<T> {
    pub id: T,
}

pub async fn add_recipient(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
    Json(request): Json<NewRecipient>,
) -> ApiResult<(StatusCode, Json<CreatedResponse<RecipientId>>)> {
    let recipient = state.service.add_recipient(&actor, id, request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: recipient })))
}

/// Remove recipient response
#[derive(Debug, Serialize)]
pub struct RemoveRecipientResponse {
    pub fields_removed: usize,
}

pub async fn remove_recipient(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path((id, recipient_id)): Path<(EnvelopeId, RecipientId)>,
) -> ApiResult<Json<RemoveRecipientResponse>> {
    let fields_removed = state
        .service
        .remove_recipient(&actor, id, recipient_id)
        .await?;
    Ok(Json(RemoveRecipientResponse { fields_removed }))
}

pub async fn add_field(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
    Json(request): Json<NewField>,
) -> ApiResult<(StatusCode, Json<CreatedResponse<FieldId>>)> {
    let field = state.service.add_field(&actor, id, request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: field })))
}

pub async fn remove_field(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path((id, field_id)): Path<(EnvelopeId, FieldId)>,
) -> ApiResult<StatusCode> {
    state.service.remove_field(&actor, id, field_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a draft
pub async fn send_envelope(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<Json<EnvelopeSummary>> {
    let summary = state.service.send(&actor, id).await?;
    tracing::info!(envelope = %id, "Sent envelope");
    Ok(Json(summary))
}

/// Cancel a non-terminal envelope
pub async fn cancel_envelope(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<Json<EnvelopeSummary>> {
    let summary = state.service.cancel(&actor, id).await?;
    tracing::info!(envelope = %id, "Cancelled envelope");
    Ok(Json(summary))
}

/// Issue a fresh token to a recipient
pub async fn resend_recipient(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path((id, recipient_id)): Path<(EnvelopeId, RecipientId)>,
) -> ApiResult<Json<EnvelopeSummary>> {
    Ok(Json(state.service.resend(&actor, id, recipient_id).await?))
}

/// Render retry response
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub queued: bool,
}

/// Re-enqueue rendering of a completed envelope
pub async fn retry_render(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<(StatusCode, Json<RenderResponse>)> {
    let queued = state.service.retry_render(&actor, id).await?;
    let status = if queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(RenderResponse { queued })))
}

/// Download the rendered PDF
pub async fn download_document(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.service.download(&actor, id).await?;
    Ok(([(header::CONTENT_TYPE, PDF_CONTENT_TYPE)], bytes))
}

/// Audit trail response
#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub records: Vec<AuditRecord>,
    pub verification: ChainVerification,
}

pub async fn get_audit(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<Json<AuditResponse>> {
    let records = state.service.audit_trail(&actor, id).await?;
    let verification = state.service.verify_audit(&actor, id).await?;
    Ok(Json(AuditResponse {
        records,
        verification,
    }))
}

pub async fn list_signatures(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    Path(id): Path<EnvelopeId>,
) -> ApiResult<Json<Vec<SignatureRecord>>> {
    Ok(Json(state.service.signatures(&actor, id).await?))
}

/// Renders that exhausted their retries
pub async fn list_failed_renders(
    State(state): State<AppState>,
    OwnerActor(_actor): OwnerActor,
) -> Json<Vec<FailedRender>> {
    Json(state.service.failed_renders())
}
