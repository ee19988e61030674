//! Knowledge Gateway
//!
//! A thin backend that forwards document search and ingestion to the
//! configured knowledge base providers:
//! - Flowise document stores (including chunk management)
//! - Supabase `pgvector` tables
//! - Pinecone indexes

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use infrastructure::{
    embedding::OpenAiEmbeddingProvider, http_client::HttpClient,
    knowledge_base::KnowledgeBaseFactory, services::KnowledgeBaseService,
};
use tracing::{info, warn};

/// Create the application state from configuration
///
/// Nothing here talks to a provider; unreachable backends surface per request.
pub fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let settings = config.search_settings()?;
    let client = HttpClient::with_timeout(settings.provider_timeout)?;

    let registry = KnowledgeBaseFactory::build_registry(client.clone(), config.provider_configs())?;
    if registry.is_empty() {
        warn!("No knowledge base providers configured");
    } else {
        info!(providers = ?registry.sources(), "Knowledge base providers configured");
    }

    let mut service = KnowledgeBaseService::new(registry, settings);

    match &config.embedding.api_key {
        Some(api_key) if !api_key.trim().is_empty() => {
            let embedder =
                OpenAiEmbeddingProvider::with_base_url(client, api_key, &config.embedding.base_url)
                    .with_model(&config.embedding.model);
            info!(model = %config.embedding.model, "Embedding provider configured");
            service = service.with_embedder(Arc::new(embedder));
        }
        _ => warn!("No embedding API key configured; Supabase and Pinecone cannot be queried"),
    }

    Ok(AppState::new(Arc::new(service)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseSection;
    use crate::domain::ProviderSource;

    #[test]
    fn test_create_app_state_without_providers() {
        let state = create_app_state(&AppConfig::default()).unwrap();

        assert!(state.knowledge_base.configured_providers().is_empty());
    }

    #[test]
    fn test_create_app_state_registers_sections() {
        let mut config = AppConfig::default();
        config.supabase = Some(SupabaseSection {
            url: "https://project.supabase.co".to_string(),
            api_key: "service-key".to_string(),
            tables: Vec::new(),
        });
        config.embedding.api_key = Some("sk-test".to_string());

        let state = create_app_state(&config).unwrap();

        assert_eq!(
            state.knowledge_base.configured_providers(),
            vec![ProviderSource::Supabase]
        );
    }

    #[test]
    fn test_create_app_state_rejects_invalid_settings() {
        let mut config = AppConfig::default();
        config.knowledge_base.match_threshold = 1.5;

        assert!(create_app_state(&config).is_err());
    }
}
