//! Domain layer - provider-agnostic types and traits

pub mod embedding;
pub mod error;
pub mod knowledge_base;

pub use error::DomainError;
pub use knowledge_base::{
    AddDocumentOutcome, Document, DocumentStore, KnowledgeBaseProvider, ProviderSource,
    SearchResult,
};
