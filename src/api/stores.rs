//! Document store endpoints

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::targets::parse_target;
use crate::api::types::{ApiError, Json};
use crate::domain::knowledge_base::{ChunkPage, ChunkUpdate, DocumentChunk, DocumentStore};

#[derive(Debug, Clone, Deserialize)]
pub struct ListStoresParams {
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListStoresResponse {
    pub stores: Vec<DocumentStore>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStoreRequest {
    pub store_id: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreResponse {
    pub store: DocumentStore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkParams {
    pub document_id: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub chunk: DocumentChunk,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteChunkResponse {
    pub success: bool,
}

/// GET /stores
pub async fn list_stores(
    State(state): State<AppState>,
    Query(params): Query<ListStoresParams>,
) -> Result<Json<ListStoresResponse>, ApiError> {
    let target = params.target.as_deref().map(parse_target).transpose()?;
    debug!(?target, "Listing document stores");

    let stores = state.knowledge_base.list_stores(target).await?;

    Ok(Json(ListStoresResponse { stores }))
}

/// POST /stores
pub async fn get_store(
    State(state): State<AppState>,
    Json(request): Json<GetStoreRequest>,
) -> Result<Json<StoreResponse>, ApiError> {
    let store_id = request
        .store_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::missing("storeId"))?;
    let target = request.target.as_deref().map(parse_target).transpose()?;
    debug!(store_id = %store_id, ?target, "Getting document store");

    let store = state.knowledge_base.get_store(&store_id, target).await?;

    Ok(Json(StoreResponse { store }))
}

/// GET /stores/{store_id}/chunks
pub async fn list_chunks(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(params): Query<ChunkParams>,
) -> Result<Json<ChunkPage>, ApiError> {
    let page = state
        .knowledge_base
        .document_chunks(&store_id, params.document_id.as_deref(), params.page)
        .await?;

    Ok(Json(page))
}

/// PUT /stores/{store_id}/chunks/{document_id}/{chunk_id}
pub async fn update_chunk(
    State(state): State<AppState>,
    Path((store_id, document_id, chunk_id)): Path<(String, String, String)>,
    Json(update): Json<ChunkUpdate>,
) -> Result<Json<ChunkResponse>, ApiError> {
    let chunk = state
        .knowledge_base
        .update_chunk(&store_id, &document_id, &chunk_id, update)
        .await?;

    Ok(Json(ChunkResponse { chunk }))
}

/// DELETE /stores/{store_id}/chunks/{document_id}/{chunk_id}
pub async fn delete_chunk(
    State(state): State<AppState>,
    Path((store_id, document_id, chunk_id)): Path<(String, String, String)>,
) -> Result<Json<DeleteChunkResponse>, ApiError> {
    let success = state
        .knowledge_base
        .delete_chunk(&store_id, &document_id, &chunk_id)
        .await?;

    Ok(Json(DeleteChunkResponse { success }))
}
