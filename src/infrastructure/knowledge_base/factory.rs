//! Knowledge base provider factory

use std::sync::Arc;

use crate::domain::knowledge_base::{KnowledgeBaseProvider, ProviderSource};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClient;

use super::flowise::{FlowiseConfig, FlowiseKnowledgeBase};
use super::pinecone::{PineconeConfig, PineconeKnowledgeBase};
use super::registry::ProviderRegistry;
use super::supabase::{SupabaseConfig, SupabaseKnowledgeBase};

/// Provider-specific configuration
#[derive(Debug, Clone)]
pub enum KnowledgeBaseProviderConfig {
    Flowise(FlowiseConfig),
    Supabase(SupabaseConfig),
    Pinecone(PineconeConfig),
}

impl KnowledgeBaseProviderConfig {
    pub fn source(&self) -> ProviderSource {
        match self {
            Self::Flowise(_) => ProviderSource::Flowise,
            Self::Supabase(_) => ProviderSource::Supabase,
            Self::Pinecone(_) => ProviderSource::Pinecone,
        }
    }
}

impl From<FlowiseConfig> for KnowledgeBaseProviderConfig {
    fn from(config: FlowiseConfig) -> Self {
        Self::Flowise(config)
    }
}

impl From<SupabaseConfig> for KnowledgeBaseProviderConfig {
    fn from(config: SupabaseConfig) -> Self {
        Self::Supabase(config)
    }
}

impl From<PineconeConfig> for KnowledgeBaseProviderConfig {
    fn from(config: PineconeConfig) -> Self {
        Self::Pinecone(config)
    }
}

/// Factory for creating knowledge base providers
#[derive(Debug)]
pub struct KnowledgeBaseFactory;

impl KnowledgeBaseFactory {
    /// Create a single provider from configuration
    pub fn create(
        client: HttpClient,
        config: KnowledgeBaseProviderConfig,
    ) -> Result<Arc<dyn KnowledgeBaseProvider>, DomainError> {
        let provider: Arc<dyn KnowledgeBaseProvider> = match config {
            KnowledgeBaseProviderConfig::Flowise(cfg) => {
                Arc::new(FlowiseKnowledgeBase::new(client, cfg)?)
            }
            KnowledgeBaseProviderConfig::Supabase(cfg) => {
                Arc::new(SupabaseKnowledgeBase::new(client, cfg)?)
            }
            KnowledgeBaseProviderConfig::Pinecone(cfg) => {
                Arc::new(PineconeKnowledgeBase::new(client, cfg)?)
            }
        };

        Ok(provider)
    }

    /// Build the registry for every configured backend
    ///
    /// Flowise is also registered as the chunk store.
    pub fn build_registry(
        client: HttpClient,
        configs: Vec<KnowledgeBaseProviderConfig>,
    ) -> Result<ProviderRegistry, DomainError> {
        let mut registry = ProviderRegistry::new();

        for config in configs {
            registry = match config {
                KnowledgeBaseProviderConfig::Flowise(cfg) => {
                    let flowise = Arc::new(FlowiseKnowledgeBase::new(client.clone(), cfg)?);
                    registry
                        .with_provider(flowise.clone())
                        .with_chunk_store(flowise)
                }
                other => registry.with_provider(Self::create(client.clone(), other)?),
            };
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_conversion() {
        let config: KnowledgeBaseProviderConfig = PineconeConfig::new("key").into();
        assert_eq!(config.source(), ProviderSource::Pinecone);

        let config: KnowledgeBaseProviderConfig =
            SupabaseConfig::new("https://x.supabase.co", "key").into();
        assert_eq!(config.source(), ProviderSource::Supabase);
    }

    #[test]
    fn test_build_registry() {
        let registry = KnowledgeBaseFactory::build_registry(
            HttpClient::new(),
            vec![
                FlowiseConfig::new("http://flowise/api/v1", "key").into(),
                SupabaseConfig::new("https://x.supabase.co", "key").into(),
            ],
        )
        .unwrap();

        assert_eq!(
            registry.sources(),
            vec![ProviderSource::Supabase, ProviderSource::Flowise]
        );
        assert!(registry.chunk_store().is_ok());
    }

    #[test]
    fn test_build_registry_rejects_incomplete_config() {
        let result = KnowledgeBaseFactory::build_registry(
            HttpClient::new(),
            vec![FlowiseConfig::new("", "").into()],
        );

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
