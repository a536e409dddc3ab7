//! Source document upload

use crate::api::rest::actor::OwnerActor;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use envelope_types::DocumentKey;
use serde::Serialize;

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: DocumentKey,
    pub url: String,
    pub pages: u32,
}

/// Store a raw PDF body; the returned key is used to create envelopes.
pub async fn upload_document(
    State(state): State<AppState>,
    OwnerActor(actor): OwnerActor,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let stored = state.service.upload_document(&actor, body.to_vec()).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key: stored.key,
            url: stored.url,
            pages: stored.pages,
        }),
    ))
}
