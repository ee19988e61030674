//! Document search, ingestion and deletion endpoints

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::targets::{parse_csv, parse_optional};
use crate::api::types::{ApiError, Json, TargetList};
use crate::domain::knowledge_base::{AddDocumentOutcome, Document, Metadata, SearchResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: Option<String>,
    pub store_id: Option<String>,
    pub targets: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Request to add a document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDocumentRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub store_id: Option<String>,
    pub targets: Option<TargetList>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddDocumentResponse {
    pub result: Vec<AddDocumentOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub document_id: Option<String>,
    pub store_id: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteDocumentResponse {
    pub result: DeleteOutcome,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::missing(name))
}

/// GET /documents
pub async fn search_documents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = required(params.query, "query")?;
    let targets = params.targets.as_deref().map(parse_csv).transpose()?;
    debug!(query = %query, store_id = ?params.store_id, ?targets, "Searching documents");

    let results = state
        .knowledge_base
        .search(&query, targets.as_deref(), params.store_id.as_deref())
        .await?;

    Ok(Json(SearchResponse { results }))
}

/// POST /documents
pub async fn add_document(
    State(state): State<AppState>,
    Json(request): Json<AddDocumentRequest>,
) -> Result<Json<AddDocumentResponse>, ApiError> {
    let content = required(request.content, "content")?;
    let targets = parse_optional(request.targets.as_ref())?;
    debug!(store_id = ?request.store_id, ?targets, "Adding document");

    let document = Document::new(content).with_metadata(request.metadata.unwrap_or_default());
    let result = state
        .knowledge_base
        .add_document(document, targets.as_deref(), request.store_id.as_deref())
        .await?;

    Ok(Json(AddDocumentResponse { result }))
}

/// DELETE /documents
pub async fn delete_document(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteDocumentResponse>, ApiError> {
    let document_id = required(params.document_id, "documentId")?;
    let store_id = required(params.store_id, "storeId")?;
    let targets = params.target.as_deref().map(parse_csv).transpose()?;
    debug!(document_id = %document_id, store_id = %store_id, ?targets, "Deleting document");

    let success = state
        .knowledge_base
        .delete_document(&document_id, targets.as_deref(), Some(store_id.as_str()))
        .await?;

    Ok(Json(DeleteDocumentResponse {
        result: DeleteOutcome { success },
    }))
}
