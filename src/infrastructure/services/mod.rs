//! Infrastructure services

mod knowledge_base_service;

pub use knowledge_base_service::{
    sort_by_similarity, KnowledgeBaseService, SearchSettings, ALL_DOCUMENTS,
};
