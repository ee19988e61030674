//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, EmbeddingConfig, FlowiseSection, KnowledgeBaseConfig, LogFormat, LoggingConfig,
    PineconeSection, ServerConfig, SupabaseSection,
};
