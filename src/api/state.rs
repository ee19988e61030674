//! Application state for shared services

use std::sync::Arc;

use crate::domain::knowledge_base::{
    AddDocumentOutcome, ChunkPage, ChunkUpdate, Document, DocumentChunk, DocumentStore,
    ProviderSource, SearchResult,
};
use crate::domain::DomainError;
use crate::infrastructure::services::KnowledgeBaseService;

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub knowledge_base: Arc<dyn KnowledgeBaseServiceTrait>,
}

impl AppState {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBaseServiceTrait>) -> Self {
        Self { knowledge_base }
    }
}

/// Trait for knowledge base service operations
#[async_trait::async_trait]
pub trait KnowledgeBaseServiceTrait: Send + Sync {
    fn configured_providers(&self) -> Vec<ProviderSource>;

    async fn search(
        &self,
        query: &str,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn add_document(
        &self,
        document: Document,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<Vec<AddDocumentOutcome>, DomainError>;

    async fn delete_document(
        &self,
        document_id: &str,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<bool, DomainError>;

    async fn list_stores(
        &self,
        target: Option<ProviderSource>,
    ) -> Result<Vec<DocumentStore>, DomainError>;

    async fn get_store(
        &self,
        store_id: &str,
        target: Option<ProviderSource>,
    ) -> Result<DocumentStore, DomainError>;

    async fn document_chunks(
        &self,
        store_id: &str,
        document_id: Option<&str>,
        page: Option<u32>,
    ) -> Result<ChunkPage, DomainError>;

    async fn update_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: ChunkUpdate,
    ) -> Result<DocumentChunk, DomainError>;

    async fn delete_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
    ) -> Result<bool, DomainError>;
}

#[async_trait::async_trait]
impl KnowledgeBaseServiceTrait for KnowledgeBaseService {
    fn configured_providers(&self) -> Vec<ProviderSource> {
        KnowledgeBaseService::configured_providers(self)
    }

    async fn search(
        &self,
        query: &str,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        KnowledgeBaseService::search(self, query, targets, store_id).await
    }

    async fn add_document(
        &self,
        document: Document,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<Vec<AddDocumentOutcome>, DomainError> {
        KnowledgeBaseService::add_document(self, document, targets, store_id).await
    }

    async fn delete_document(
        &self,
        document_id: &str,
        targets: Option<&[ProviderSource]>,
        store_id: Option<&str>,
    ) -> Result<bool, DomainError> {
        KnowledgeBaseService::delete_document(self, document_id, targets, store_id).await
    }

    async fn list_stores(
        &self,
        target: Option<ProviderSource>,
    ) -> Result<Vec<DocumentStore>, DomainError> {
        KnowledgeBaseService::list_stores(self, target).await
    }

    async fn get_store(
        &self,
        store_id: &str,
        target: Option<ProviderSource>,
    ) -> Result<DocumentStore, DomainError> {
        KnowledgeBaseService::get_store(self, store_id, target).await
    }

    async fn document_chunks(
        &self,
        store_id: &str,
        document_id: Option<&str>,
        page: Option<u32>,
    ) -> Result<ChunkPage, DomainError> {
        KnowledgeBaseService::document_chunks(self, store_id, document_id, page).await
    }

    async fn update_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: ChunkUpdate,
    ) -> Result<DocumentChunk, DomainError> {
        KnowledgeBaseService::update_chunk(self, store_id, document_id, chunk_id, update).await
    }

    async fn delete_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
    ) -> Result<bool, DomainError> {
        KnowledgeBaseService::delete_chunk(self, store_id, document_id, chunk_id).await
    }
}
