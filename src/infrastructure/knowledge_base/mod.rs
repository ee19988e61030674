//! Knowledge base provider implementations

mod factory;
pub mod flowise;
pub mod pinecone;
mod registry;
pub mod supabase;

pub use factory::{KnowledgeBaseFactory, KnowledgeBaseProviderConfig};
pub use flowise::{FlowiseConfig, FlowiseKnowledgeBase, FLOWISE_PLACEHOLDER_SIMILARITY};
pub use pinecone::{PineconeConfig, PineconeKnowledgeBase};
pub use registry::ProviderRegistry;
pub use supabase::{SupabaseConfig, SupabaseKnowledgeBase, SupabaseTableConfig};
