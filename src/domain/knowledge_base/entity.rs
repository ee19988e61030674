//! Knowledge base entities shared by every provider

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Free-form metadata attached to documents and results
pub type Metadata = HashMap<String, serde_json::Value>;

/// Vector store backend an operation targets
///
/// The declaration order is the order providers are visited during fan-out,
/// which is also the tie-break order of merged results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSource {
    /// Supabase (PostgREST over pgvector)
    Supabase,
    /// Pinecone vector index
    Pinecone,
    /// Flowise document store
    Flowise,
}

impl ProviderSource {
    /// All known sources in fan-out order
    pub const ALL: [ProviderSource; 3] = [Self::Supabase, Self::Pinecone, Self::Flowise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supabase => "supabase",
            Self::Pinecone => "pinecone",
            Self::Flowise => "flowise",
        }
    }
}

impl std::fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "pinecone" => Ok(Self::Pinecone),
            "flowise" => Ok(Self::Flowise),
            other => Err(DomainError::validation(format!(
                "Unknown knowledge base provider: {}",
                other
            ))),
        }
    }
}

/// A named collection on a remote backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStore {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub provider: ProviderSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<u64>,
}

impl DocumentStore {
    /// Create a store with the given id and name; the name defaults to the id
    pub fn new(provider: ProviderSource, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            status: "SYNC".to_string(),
            created_at: None,
            updated_at: None,
            provider,
            document_count: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_timestamps(
        mut self,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn with_document_count(mut self, count: u64) -> Self {
        self.document_count = Some(count);
        self
    }
}

/// Document to ingest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// String metadata value, if present
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Normalized search hit, independent of the provider that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl SearchResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            store_id: None,
            store_name: None,
            similarity: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_store(mut self, store: &DocumentStore) -> Self {
        self.store_id = Some(store.id.clone());
        self.store_name = Some(store.name.clone());
        self
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }
}

/// Outcome status of a single ingestion target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddStatus {
    Success,
    Error,
}

/// Per-target result of a multi-store ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDocumentOutcome {
    pub target: ProviderSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub status: AddStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddDocumentOutcome {
    pub fn success(target: ProviderSource, store_id: impl Into<String>) -> Self {
        Self {
            target,
            store_id: Some(store_id.into()),
            status: AddStatus::Success,
            error: None,
        }
    }

    pub fn error(target: ProviderSource, store_id: Option<String>, error: impl ToString) -> Self {
        Self {
            target,
            store_id,
            status: AddStatus::Error,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AddStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_source_parse() {
        assert_eq!("supabase".parse::<ProviderSource>().unwrap(), ProviderSource::Supabase);
        assert_eq!(" Pinecone ".parse::<ProviderSource>().unwrap(), ProviderSource::Pinecone);
        assert_eq!("FLOWISE".parse::<ProviderSource>().unwrap(), ProviderSource::Flowise);
        assert!("qdrant".parse::<ProviderSource>().is_err());
    }

    #[test]
    fn test_provider_source_order() {
        let mut sources = vec![
            ProviderSource::Flowise,
            ProviderSource::Supabase,
            ProviderSource::Pinecone,
        ];
        sources.sort();
        assert_eq!(sources, ProviderSource::ALL.to_vec());
    }

    #[test]
    fn test_search_result_serialization_skips_missing_fields() {
        let result = SearchResult::new("refund policy");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["content"], "refund policy");
        assert!(json.get("storeId").is_none());
        assert!(json.get("similarity").is_none());
    }

    #[test]
    fn test_search_result_with_store() {
        let store = DocumentStore::new(ProviderSource::Flowise, "store-1").with_name("Manuals");
        let result = SearchResult::new("content").with_store(&store).with_similarity(0.9);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["storeId"], "store-1");
        assert_eq!(json["storeName"], "Manuals");
        assert!((json["similarity"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_document_store_serialization() {
        let store = DocumentStore::new(ProviderSource::Pinecone, "faq-index")
            .with_status("Initializing")
            .with_document_count(12);
        let json = serde_json::to_value(&store).unwrap();

        assert_eq!(json["id"], "faq-index");
        assert_eq!(json["name"], "faq-index");
        assert_eq!(json["provider"], "pinecone");
        assert_eq!(json["status"], "Initializing");
        assert_eq!(json["documentCount"], 12);
    }

    #[test]
    fn test_add_outcome_serialization() {
        let ok = AddDocumentOutcome::success(ProviderSource::Supabase, "documents");
        let failed = AddDocumentOutcome::error(ProviderSource::Flowise, None, "boom");

        let ok_json = serde_json::to_value(&ok).unwrap();
        assert_eq!(ok_json["status"], "success");
        assert_eq!(ok_json["storeId"], "documents");
        assert!(ok_json.get("error").is_none());

        let failed_json = serde_json::to_value(&failed).unwrap();
        assert_eq!(failed_json["status"], "error");
        assert_eq!(failed_json["target"], "flowise");
        assert_eq!(failed_json["error"], "boom");
        assert!(!failed.is_success());
    }

    #[test]
    fn test_document_metadata_str() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), serde_json::json!("Refunds"));
        metadata.insert("pages".into(), serde_json::json!(3));
        let doc = Document::new("text").with_metadata(metadata);

        assert_eq!(doc.metadata_str("title"), Some("Refunds"));
        assert_eq!(doc.metadata_str("pages"), None);
        assert_eq!(doc.metadata_str("missing"), None);
    }
}
