//! Document chunks as stored by a document-store backend

use serde::{Deserialize, Serialize};

use super::entity::Metadata;

/// A chunk of a loaded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_no: Option<u64>,
}

impl DocumentChunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_id: None,
            store_id: None,
            content: content.into(),
            metadata: Metadata::new(),
            chunk_no: None,
        }
    }
}

/// One page of chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPage {
    pub chunks: Vec<DocumentChunk>,
    /// Total chunk count reported by the backend
    pub count: u64,
    pub current_page: u32,
}

/// Update applied to an existing chunk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUpdate {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}
