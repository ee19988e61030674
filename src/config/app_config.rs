use std::time::Duration;

use serde::Deserialize;

use crate::domain::{DomainError, ProviderSource};
use crate::infrastructure::knowledge_base::{
    pinecone::DEFAULT_CONTROLLER_URL, FlowiseConfig, KnowledgeBaseProviderConfig, PineconeConfig,
    SupabaseConfig, SupabaseTableConfig,
};
use crate::infrastructure::services::SearchSettings;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub flowise: Option<FlowiseSection>,
    #[serde(default)]
    pub supabase: Option<SupabaseSection>,
    #[serde(default)]
    pub pinecone: Option<PineconeSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Fan-out tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// Providers used when a request names none; empty means every configured one
    pub default_targets: Vec<String>,
    pub match_threshold: f32,
    pub match_count: u32,
    pub provider_timeout_secs: u64,
}

/// OpenAI-compatible embedding endpoint used by the vector backends
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowiseSection {
    pub api_url: String,
    pub api_key: String,
    /// Key Flowise uses for its own embedding step; defaults to `embedding.api_key`
    #[serde(default)]
    pub embedding_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSection {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_supabase_tables")]
    pub tables: Vec<SupabaseTableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PineconeSection {
    pub api_key: String,
    #[serde(default = "default_controller_url")]
    pub controller_url: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub default_index: Option<String>,
}

fn default_supabase_tables() -> Vec<SupabaseTableConfig> {
    vec![SupabaseTableConfig::default()]
}

fn default_controller_url() -> String {
    DEFAULT_CONTROLLER_URL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            default_targets: Vec::new(),
            match_threshold: 0.78,
            match_count: 5,
            provider_timeout_secs: 5,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "text-embedding-3-small".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("knowledge_base.default_targets")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parsed default targets, rejecting unknown provider names
    pub fn default_targets(&self) -> Result<Vec<ProviderSource>, DomainError> {
        self.knowledge_base
            .default_targets
            .iter()
            .map(|name| name.parse())
            .collect()
    }

    pub fn search_settings(&self) -> Result<SearchSettings, DomainError> {
        let kb = &self.knowledge_base;

        if !(0.0..=1.0).contains(&kb.match_threshold) {
            return Err(DomainError::configuration(format!(
                "knowledge_base.match_threshold must be between 0 and 1, got {}",
                kb.match_threshold
            )));
        }
        if kb.match_count == 0 {
            return Err(DomainError::configuration(
                "knowledge_base.match_count must be at least 1",
            ));
        }

        let settings = SearchSettings {
            match_threshold: kb.match_threshold,
            match_count: kb.match_count,
            ..Default::default()
        };

        Ok(settings
            .with_provider_timeout(Duration::from_secs(kb.provider_timeout_secs.max(1)))
            .with_default_targets(self.default_targets()?))
    }

    /// Provider configurations for every section that is present
    pub fn provider_configs(&self) -> Vec<KnowledgeBaseProviderConfig> {
        let mut configs = Vec::new();

        if let Some(flowise) = &self.flowise {
            let mut config = FlowiseConfig::new(&flowise.api_url, &flowise.api_key);
            if let Some(key) = flowise
                .embedding_api_key
                .as_ref()
                .or(self.embedding.api_key.as_ref())
            {
                config = config.with_embedding_api_key(key);
            }
            configs.push(config.into());
        }

        if let Some(supabase) = &self.supabase {
            configs.push(
                SupabaseConfig::new(&supabase.url, &supabase.api_key)
                    .with_tables(supabase.tables.clone())
                    .into(),
            );
        }

        if let Some(pinecone) = &self.pinecone {
            let mut config =
                PineconeConfig::new(&pinecone.api_key)
                    .with_controller_url(&pinecone.controller_url);
            if let Some(namespace) = &pinecone.namespace {
                config = config.with_namespace(namespace);
            }
            if let Some(index) = &pinecone.default_index {
                config = config.with_default_index(index);
            }
            configs.push(config.into());
        }

        configs
    }
}
