//! Knowledge base provider traits

use std::fmt::Debug;

use async_trait::async_trait;

use super::document::{ChunkPage, ChunkUpdate, DocumentChunk};
use super::entity::{Document, DocumentStore, ProviderSource, SearchResult};
use crate::domain::error::DomainError;

/// Backend-native match record, normalized by [`KnowledgeBaseProvider::normalize`]
pub type RawMatch = serde_json::Value;

/// Document plus the optional precomputed embedding for vector backends
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub document: Document,
    pub embedding: Option<Vec<f32>>,
}

impl DocumentPayload {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Embedding, or a validation error for backends that cannot work without one
    pub fn require_embedding(&self, provider: ProviderSource) -> Result<&[f32], DomainError> {
        self.embedding.as_deref().ok_or_else(|| {
            DomainError::validation(format!("{} upsert requires an embedding", provider))
        })
    }
}

/// Query parameters passed to every store during a search
#[derive(Debug, Clone)]
pub struct QueryInput {
    pub text: String,
    pub vector: Option<Vec<f32>>,
    pub top_k: u32,
    pub match_threshold: f32,
}

impl QueryInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            vector: None,
            top_k: 5,
            match_threshold: 0.78,
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn require_vector(&self, provider: ProviderSource) -> Result<&[f32], DomainError> {
        self.vector.as_deref().ok_or_else(|| {
            DomainError::validation(format!("{} query requires an embedding", provider))
        })
    }
}

/// Result of a single upsert call
#[derive(Debug, Clone, Default)]
pub struct UpsertResult {
    /// Identifiers assigned by the backend, when it reports them
    pub ids: Vec<String>,
    /// Raw backend response
    pub raw: serde_json::Value,
}

impl UpsertResult {
    pub fn new(ids: Vec<String>, raw: serde_json::Value) -> Self {
        Self { ids, raw }
    }
}

/// Uniform call surface of a vector/document-store backend
///
/// Implementations wrap one backend's REST API. None of the methods retry.
#[async_trait]
pub trait KnowledgeBaseProvider: Send + Sync + Debug {
    /// Which backend this provider talks to
    fn source(&self) -> ProviderSource;

    /// Whether upserts and queries need a precomputed embedding
    fn requires_embedding(&self) -> bool;

    /// Store used when a caller does not name one
    fn default_store_id(&self) -> Option<String> {
        None
    }

    /// List every store the backend exposes
    async fn list_stores(&self) -> Result<Vec<DocumentStore>, DomainError>;

    /// Fetch one store, `NotFound` if the backend has no such store
    async fn get_store(&self, id: &str) -> Result<DocumentStore, DomainError>;

    /// Insert or update a document in a store
    async fn upsert(
        &self,
        store_id: &str,
        payload: &DocumentPayload,
    ) -> Result<UpsertResult, DomainError>;

    /// Query a store, returning backend-native match records
    async fn query(&self, store_id: &str, input: &QueryInput) -> Result<Vec<RawMatch>, DomainError>;

    /// Map one native match record into the common result shape
    fn normalize(&self, store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError>;

    /// Delete a document by id, `NotFound` if the id is absent
    async fn delete_by_id(&self, store_id: &str, id: &str) -> Result<bool, DomainError>;
}

/// Chunk-level access for backends that expose loaded chunks
#[async_trait]
pub trait ChunkStore: Send + Sync + Debug {
    async fn list_chunks(
        &self,
        store_id: &str,
        document_id: &str,
        page: u32,
    ) -> Result<ChunkPage, DomainError>;

    async fn update_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: &ChunkUpdate,
    ) -> Result<DocumentChunk, DomainError>;

    async fn delete_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
    ) -> Result<bool, DomainError>;
}
