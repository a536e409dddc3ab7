//! Token-gated recipient handlers

use crate::api::rest::actor::ClientContext;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use envelope_engine::{FieldInput, RecipientView};
use envelope_service::Completion;
use envelope_types::{
    hex_bytes, CaptureMethod, CapabilityToken, EnvelopeStatus, Field, FieldId, GeoLocation,
    SignatureCapture, SignatureMetadata,
};
use serde::{Deserialize, Serialize};

/// The recipient's view of the envelope
pub async fn view_envelope(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<RecipientView>> {
    let token = CapabilityToken::from_transport(token);
    Ok(Json(state.service.view(&token).await?))
}

/// Fill request
#[derive(Debug, Deserialize)]
pub struct FillRequest {
    pub value: FieldInput,
}

pub async fn fill_field(
    State(state): State<AppState>,
    Path((token, field_id)): Path<(String, FieldId)>,
    Json(request): Json<FillRequest>,
) -> ApiResult<Json<Field>> {
    let token = CapabilityToken::from_transport(token);
    Ok(Json(
        state
            .service
            .fill_field(&token, field_id, request.value)
            .await?,
    ))
}

/// Sign or approve request. The image is hex encoded.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub method: CaptureMethod,
    #[serde(default, with = "hex_bytes")]
    pub image: Vec<u8>,
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    pub geolocation: Option<GeoLocation>,
}

pub async fn complete(
    State(state): State<AppState>,
    Path(token): Path<String>,
    client: ClientContext,
    Json(request): Json<CompleteRequest>,
) -> ApiResult<Json<Completion>> {
    let token = CapabilityToken::from_transport(token);
    let capture = SignatureCapture {
        method: request.method,
        image: request.image,
        metadata: SignatureMetadata::new(
            client.ip_address,
            client.user_agent,
            request.geolocation,
        ),
        consent: request.consent,
    };
    Ok(Json(state.service.complete(&token, capture).await?))
}

/// Decline request
#[derive(Debug, Deserialize)]
pub struct DeclineRequest {
    pub reason: String,
}

/// Decline response
#[derive(Debug, Serialize)]
pub struct DeclineResponse {
    pub envelope_status: EnvelopeStatus,
}

pub async fn decline(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<DeclineRequest>,
) -> ApiResult<Json<DeclineResponse>> {
    let token = CapabilityToken::from_transport(token);
    let envelope_status = state.service.decline(&token, &request.reason).await?;
    Ok(Json(DeclineResponse { envelope_status }))
}
