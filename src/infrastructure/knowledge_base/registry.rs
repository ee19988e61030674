//! Knowledge base provider registry - one provider instance per backend

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::knowledge_base::{ChunkStore, KnowledgeBaseProvider, ProviderSource};
use crate::domain::DomainError;

/// Registry mapping each configured backend to its provider
///
/// Built once at startup and immutable afterwards. Iteration follows
/// [`ProviderSource`] order.
#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderSource, Arc<dyn KnowledgeBaseProvider>>,
    chunk_store: Option<Arc<dyn ChunkStore>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any earlier one for the same backend
    pub fn with_provider(mut self, provider: Arc<dyn KnowledgeBaseProvider>) -> Self {
        self.providers.insert(provider.source(), provider);
        self
    }

    /// Register the backend that serves chunk-level operations
    pub fn with_chunk_store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.chunk_store = Some(store);
        self
    }

    pub fn get(&self, source: ProviderSource) -> Option<Arc<dyn KnowledgeBaseProvider>> {
        self.providers.get(&source).cloned()
    }

    /// Get a provider, returning error if the backend is not configured
    pub fn get_required(
        &self,
        source: ProviderSource,
    ) -> Result<Arc<dyn KnowledgeBaseProvider>, DomainError> {
        self.get(source).ok_or_else(|| {
            DomainError::unsupported(format!(
                "Knowledge base provider '{}' is not configured",
                source
            ))
        })
    }

    pub fn chunk_store(&self) -> Result<Arc<dyn ChunkStore>, DomainError> {
        self.chunk_store.clone().ok_or_else(|| {
            DomainError::unsupported("Chunk operations require the flowise provider")
        })
    }

    /// Configured backends in [`ProviderSource`] order
    pub fn sources(&self) -> Vec<ProviderSource> {
        self.providers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
