//! Knowledge Base domain - stores, documents and normalized search results

mod document;
mod entity;
mod provider;

pub use document::{ChunkPage, ChunkUpdate, DocumentChunk};
pub use entity::{
    AddDocumentOutcome, AddStatus, Document, DocumentStore, Metadata, ProviderSource,
    SearchResult,
};
pub use provider::{
    ChunkStore, DocumentPayload, KnowledgeBaseProvider, QueryInput, RawMatch, UpsertResult,
};

#[cfg(test)]
pub use provider::mock::MockKnowledgeBaseProvider;
