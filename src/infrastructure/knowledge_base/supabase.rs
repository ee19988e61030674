//! Supabase (PostgREST + pgvector) provider implementation

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::knowledge_base::{
    DocumentPayload, DocumentStore, KnowledgeBaseProvider, Metadata, ProviderSource, QueryInput,
    RawMatch, SearchResult, UpsertResult,
};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClientTrait;

fn default_table() -> String {
    "documents".to_string()
}

fn default_query_name() -> String {
    "match_documents".to_string()
}

/// A table exposed as a document store, with the RPC used to query it
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseTableConfig {
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_query_name")]
    pub query_name: String,
}

impl Default for SupabaseTableConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            name: None,
            description: None,
            query_name: default_query_name(),
        }
    }
}

impl SupabaseTableConfig {
    pub fn new(table: impl Into<String>, query_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            query_name: query_name.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn to_store(&self) -> DocumentStore {
        DocumentStore::new(ProviderSource::Supabase, &self.table)
            .with_name(self.name.clone().unwrap_or_else(|| self.table.clone()))
            .with_description(self.description.clone().unwrap_or_default())
    }
}

/// Configuration for a Supabase project
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub tables: Vec<SupabaseTableConfig>,
}

impl Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("tables", &self.tables)
            .finish()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            tables: vec![SupabaseTableConfig::default()],
        }
    }

    pub fn with_tables(mut self, tables: Vec<SupabaseTableConfig>) -> Self {
        self.tables = tables;
        self
    }
}

/// Supabase provider; each configured table is one store
pub struct SupabaseKnowledgeBase<C: HttpClientTrait> {
    client: C,
    base_url: String,
    api_key: String,
    auth_header: String,
    tables: Vec<SupabaseTableConfig>,
}

impl<C: HttpClientTrait> Debug for SupabaseKnowledgeBase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseKnowledgeBase")
            .field("base_url", &self.base_url)
            .field("tables", &self.tables.len())
            .finish()
    }
}

impl<C: HttpClientTrait> SupabaseKnowledgeBase<C> {
    pub fn new(client: C, config: SupabaseConfig) -> Result<Self, DomainError> {
        if config.url.trim().is_empty() || config.api_key.trim().is_empty() {
            return Err(DomainError::configuration("Missing Supabase configuration"));
        }

        let tables = if config.tables.is_empty() {
            vec![SupabaseTableConfig::default()]
        } else {
            config.tables
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {}", config.api_key),
            api_key: config.api_key,
            tables,
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("apikey", self.api_key.as_str()),
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
            ("Prefer", "return=representation"),
        ]
    }

    fn table(&self, store_id: &str) -> Result<&SupabaseTableConfig, DomainError> {
        self.tables
            .iter()
            .find(|t| t.table == store_id)
            .ok_or_else(|| {
                DomainError::not_found(format!("Supabase table '{}' not configured", store_id))
            })
    }

    fn provider_error(e: DomainError) -> DomainError {
        match e {
            DomainError::ProviderUnavailable { message, .. } => {
                DomainError::provider(ProviderSource::Supabase.as_str(), message)
            }
            other => other,
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> KnowledgeBaseProvider for SupabaseKnowledgeBase<C> {
    fn source(&self) -> ProviderSource {
        ProviderSource::Supabase
    }

    fn requires_embedding(&self) -> bool {
        true
    }

    fn default_store_id(&self) -> Option<String> {
        self.tables.first().map(|t| t.table.clone())
    }

    async fn list_stores(&self) -> Result<Vec<DocumentStore>, DomainError> {
        Ok(self.tables.iter().map(SupabaseTableConfig::to_store).collect())
    }

    async fn get_store(&self, id: &str) -> Result<DocumentStore, DomainError> {
        self.table(id).map(SupabaseTableConfig::to_store)
    }

    async fn upsert(
        &self,
        store_id: &str,
        payload: &DocumentPayload,
    ) -> Result<UpsertResult, DomainError> {
        let table = self.table(store_id)?;
        let embedding = payload.require_embedding(ProviderSource::Supabase)?;

        let body = json!([{
            "content": payload.document.content,
            "metadata": payload.document.metadata,
            "embedding": embedding,
        }]);

        let url = format!("{}/rest/v1/{}", self.base_url, table.table);
        let raw = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        let ids = raw
            .as_array()
            .map(|rows| rows.iter().filter_map(row_id).collect())
            .unwrap_or_default();

        Ok(UpsertResult::new(ids, raw))
    }

    async fn query(
        &self,
        store_id: &str,
        input: &QueryInput,
    ) -> Result<Vec<RawMatch>, DomainError> {
        let table = self.table(store_id)?;
        let vector = input.require_vector(ProviderSource::Supabase)?;

        let body = json!({
            "query_embedding": vector,
            "match_threshold": input.match_threshold,
            "match_count": input.top_k,
        });

        let url = format!("{}/rest/v1/rpc/{}", self.base_url, table.query_name);
        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        match response {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(DomainError::provider(
                "supabase",
                format!("Unexpected RPC response: {}", other),
            )),
        }
    }

    fn normalize(&self, store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError> {
        normalize_match(store, raw)
    }

    async fn delete_by_id(&self, store_id: &str, id: &str) -> Result<bool, DomainError> {
        let table = self.table(store_id)?;

        let url = Url::parse_with_params(
            &format!("{}/rest/v1/{}", self.base_url, table.table),
            &[("id", format!("eq.{}", id))],
        )
        .map_err(|e| DomainError::configuration(format!("Invalid Supabase URL: {}", e)))?;

        let response = self
            .client
            .delete_json(url.as_str(), self.headers())
            .await
            .map_err(Self::provider_error)?;

        let deleted = response.as_array().map(|rows| !rows.is_empty()).unwrap_or(false);
        if !deleted {
            return Err(DomainError::not_found(format!(
                "Document '{}' not found in table '{}'",
                id, table.table
            )));
        }

        Ok(true)
    }
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map a `match_documents` row `{id, content, metadata, similarity}` into a [`SearchResult`]
///
/// The row id is copied into the metadata under `id` unless the metadata already
/// carries one, so callers can delete what they found.
pub fn normalize_match(store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError> {
    let content = raw
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::provider("supabase", "Match row without content"))?;

    let mut metadata: Metadata = match raw.get("metadata") {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        _ => Metadata::new(),
    };
    if let Some(id) = row_id(&raw) {
        metadata.entry("id".to_string()).or_insert(Value::String(id));
    }

    let mut result = SearchResult::new(content)
        .with_metadata(metadata)
        .with_store(store);
    if let Some(similarity) = raw.get("similarity").and_then(Value::as_f64) {
        result = result.with_similarity(similarity as f32);
    }

    Ok(result)
}
