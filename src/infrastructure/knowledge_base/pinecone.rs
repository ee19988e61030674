//! Pinecone provider implementation
//!
//! Stores are Pinecone indexes. The control plane lists and describes indexes;
//! every data-plane call goes to the index's own host, which is resolved once
//! from the index listing and then memoized.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use crate::domain::knowledge_base::{
    DocumentPayload, DocumentStore, KnowledgeBaseProvider, Metadata, ProviderSource, QueryInput,
    RawMatch, SearchResult, UpsertResult,
};
use crate::domain::DomainError;
use crate::infrastructure::http_client::{join_segments, HttpClientTrait};

pub const DEFAULT_CONTROLLER_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
/// Metadata key holding the document text
const TEXT_KEY: &str = "text";

/// Configuration for a Pinecone project
#[derive(Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub controller_url: String,
    pub namespace: Option<String>,
    pub default_index: Option<String>,
}

impl Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("controller_url", &self.controller_url)
            .field("namespace", &self.namespace)
            .field("default_index", &self.default_index)
            .finish()
    }
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            controller_url: DEFAULT_CONTROLLER_URL.to_string(),
            namespace: None,
            default_index: None,
        }
    }

    pub fn with_controller_url(mut self, url: impl Into<String>) -> Self {
        self.controller_url = url.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = Some(index.into());
        self
    }
}

/// Pinecone provider
pub struct PineconeKnowledgeBase<C: HttpClientTrait> {
    client: C,
    api_key: String,
    controller_url: String,
    namespace: String,
    default_index: Option<String>,
    hosts: OnceCell<HashMap<String, String>>,
}

impl<C: HttpClientTrait> Debug for PineconeKnowledgeBase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeKnowledgeBase")
            .field("controller_url", &self.controller_url)
            .field("namespace", &self.namespace)
            .field("hosts_resolved", &self.hosts.initialized())
            .finish()
    }
}

impl<C: HttpClientTrait> PineconeKnowledgeBase<C> {
    pub fn new(client: C, config: PineconeConfig) -> Result<Self, DomainError> {
        if config.api_key.trim().is_empty() || config.controller_url.trim().is_empty() {
            return Err(DomainError::configuration("Missing Pinecone configuration"));
        }

        Ok(Self {
            client,
            api_key: config.api_key,
            controller_url: config.controller_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.unwrap_or_default(),
            default_index: config.default_index,
            hosts: OnceCell::new(),
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Api-Key", self.api_key.as_str()),
            ("X-Pinecone-API-Version", API_VERSION),
            ("Content-Type", "application/json"),
        ]
    }

    fn provider_error(e: DomainError) -> DomainError {
        match e {
            DomainError::ProviderUnavailable { message, .. } => {
                DomainError::provider(ProviderSource::Pinecone.as_str(), message)
            }
            other => other,
        }
    }

    async fn list_indexes(&self) -> Result<Vec<Value>, DomainError> {
        let response = self
            .client
            .get_json(&format!("{}/indexes", self.controller_url), self.headers())
            .await
            .map_err(Self::provider_error)?;

        Ok(response
            .get("indexes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_index(&self, name: &str) -> Result<Value, DomainError> {
        let url = join_segments(&self.controller_url, &["indexes", name])?;
        self.client
            .get_json(&url, self.headers())
            .await
            .map_err(Self::provider_error)
    }

    /// Data-plane base URL for an index
    async fn index_url(&self, name: &str) -> Result<String, DomainError> {
        let hosts = self
            .hosts
            .get_or_try_init(|| async {
                debug!("Resolving Pinecone index hosts");
                let indexes = self.list_indexes().await?;
                Ok::<_, DomainError>(
                    indexes
                        .iter()
                        .filter_map(|index| {
                            let name = index.get("name")?.as_str()?;
                            let host = index.get("host")?.as_str()?;
                            Some((name.to_string(), host.to_string()))
                        })
                        .collect(),
                )
            })
            .await?;

        let host = match hosts.get(name) {
            Some(host) => host.clone(),
            None => {
                // Indexes created after the first resolution
                let index = self.describe_index(name).await?;
                index
                    .get("host")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| {
                        DomainError::provider("pinecone", format!("Index '{}' has no host", name))
                    })?
            }
        };

        Ok(data_plane_url(&host))
    }
}

fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl<C: HttpClientTrait> KnowledgeBaseProvider for PineconeKnowledgeBase<C> {
    fn source(&self) -> ProviderSource {
        ProviderSource::Pinecone
    }

    fn requires_embedding(&self) -> bool {
        true
    }

    fn default_store_id(&self) -> Option<String> {
        self.default_index.clone()
    }

    async fn list_stores(&self) -> Result<Vec<DocumentStore>, DomainError> {
        self.list_indexes().await?.iter().map(normalize_index).collect()
    }

    async fn get_store(&self, id: &str) -> Result<DocumentStore, DomainError> {
        normalize_index(&self.describe_index(id).await?)
    }

    async fn upsert(
        &self,
        store_id: &str,
        payload: &DocumentPayload,
    ) -> Result<UpsertResult, DomainError> {
        let values = payload.require_embedding(ProviderSource::Pinecone)?;
        let base = self.index_url(store_id).await?;

        let id = Uuid::new_v4().to_string();
        let mut metadata = payload.document.metadata.clone();
        metadata.insert(TEXT_KEY.to_string(), Value::String(payload.document.content.clone()));

        let body = json!({
            "vectors": [{ "id": id, "values": values, "metadata": metadata }],
            "namespace": self.namespace,
        });

        let raw = self
            .client
            .post_json(&format!("{}/vectors/upsert", base), self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        Ok(UpsertResult::new(vec![id], raw))
    }

    async fn query(
        &self,
        store_id: &str,
        input: &QueryInput,
    ) -> Result<Vec<RawMatch>, DomainError> {
        let vector = input.require_vector(ProviderSource::Pinecone)?;
        let base = self.index_url(store_id).await?;

        // Pinecone has no server-side threshold; topK bounds the result set
        let body = json!({
            "vector": vector,
            "topK": input.top_k,
            "includeMetadata": true,
            "namespace": self.namespace,
        });

        let response = self
            .client
            .post_json(&format!("{}/query", base), self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        Ok(response
            .get("matches")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    fn normalize(&self, store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError> {
        normalize_match(store, raw)
    }

    async fn delete_by_id(&self, store_id: &str, id: &str) -> Result<bool, DomainError> {
        let base = self.index_url(store_id).await?;

        let mut params = vec![("ids", id)];
        if !self.namespace.is_empty() {
            params.push(("namespace", self.namespace.as_str()));
        }
        let fetch_url = Url::parse_with_params(&format!("{}/vectors/fetch", base), &params)
            .map_err(|e| DomainError::provider("pinecone", format!("Invalid index host: {}", e)))?;

        let fetched = self
            .client
            .get_json(fetch_url.as_str(), self.headers())
            .await
            .map_err(Self::provider_error)?;

        let exists = fetched
            .get("vectors")
            .and_then(Value::as_object)
            .is_some_and(|vectors| vectors.contains_key(id));
        if !exists {
            return Err(DomainError::not_found(format!(
                "Vector '{}' not found in index '{}'",
                id, store_id
            )));
        }

        let body = json!({ "ids": [id], "namespace": self.namespace });
        self.client
            .post_json(&format!("{}/vectors/delete", base), self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        Ok(true)
    }
}

/// Map a control-plane index description into a [`DocumentStore`]
pub fn normalize_index(index: &Value) -> Result<DocumentStore, DomainError> {
    let name = index
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::provider("pinecone", "Index description without name"))?;

    let ready = index
        .pointer("/status/ready")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let status = if ready {
        "SYNC".to_string()
    } else {
        index
            .pointer("/status/state")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string()
    };

    let mut description = Vec::new();
    if let Some(dimension) = index.get("dimension").and_then(Value::as_u64) {
        description.push(format!("{} dimensions", dimension));
    }
    if let Some(metric) = index.get("metric").and_then(Value::as_str) {
        description.push(metric.to_string());
    }

    Ok(DocumentStore::new(ProviderSource::Pinecone, name)
        .with_description(description.join(", "))
        .with_status(status))
}

/// Map a query match `{id, score, metadata}` into a [`SearchResult`]
///
/// The text is taken out of the metadata; the vector id is added under `id`.
pub fn normalize_match(store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::provider("pinecone", "Match without id"))?;

    let mut metadata: Metadata = match raw.get("metadata") {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        _ => Metadata::new(),
    };
    let content = match metadata.remove(TEXT_KEY) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    metadata.insert("id".to_string(), Value::String(id.to_string()));

    let mut result = SearchResult::new(content)
        .with_metadata(metadata)
        .with_store(store);
    if let Some(score) = raw.get("score").and_then(Value::as_f64) {
        result = result.with_similarity(score as f32);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge_base::Document;
    use crate::infrastructure::http_client::mock::MockHttpClient;
    use reqwest::Method;

    const CONTROLLER: &str = "https://api.pinecone.io";
    const HOST: &str = "https://docs-abc123.svc.pinecone.io";

    fn indexes() -> Value {
        json!({
            "indexes": [
                {
                    "name": "docs",
                    "dimension": 1536,
                    "metric": "cosine",
                    "host": "docs-abc123.svc.pinecone.io",
                    "status": {"ready": true, "state": "Ready"}
                },
                {
                    "name": "staging",
                    "dimension": 768,
                    "metric": "dotproduct",
                    "host": "staging-xyz.svc.pinecone.io",
                    "status": {"ready": false, "state": "Initializing"}
                }
            ]
        })
    }

    fn provider(client: MockHttpClient) -> PineconeKnowledgeBase<MockHttpClient> {
        PineconeKnowledgeBase::new(client, PineconeConfig::new("pc-key")).unwrap()
    }

    #[test]
    fn test_missing_configuration_rejected() {
        let result = PineconeKnowledgeBase::new(MockHttpClient::new(), PineconeConfig::new(""));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_normalize_index_status() {
        let stores: Vec<DocumentStore> = indexes()["indexes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| normalize_index(i).unwrap())
            .collect();

        assert_eq!(stores[0].status, "SYNC");
        assert_eq!(stores[0].description, "1536 dimensions, cosine");
        assert_eq!(stores[1].status, "Initializing");
    }

    #[test]
    fn test_normalize_match_moves_text_out_of_metadata() {
        let store = DocumentStore::new(ProviderSource::Pinecone, "docs");
        let raw = json!({
            "id": "v1",
            "score": 0.87,
            "metadata": {"text": "Refunds take 5 days", "source": "faq.md"}
        });

        let result = normalize_match(&store, raw).unwrap();

        assert_eq!(result.content, "Refunds take 5 days");
        assert!(!result.metadata.contains_key("text"));
        assert_eq!(result.metadata["id"], "v1");
        assert!((result.similarity.unwrap() - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_data_plane_url() {
        assert_eq!(data_plane_url("idx.svc.pinecone.io"), "https://idx.svc.pinecone.io");
        assert_eq!(data_plane_url("http://localhost:5080/"), "http://localhost:5080");
    }

    #[tokio::test]
    async fn test_list_stores_sends_api_version() {
        let url = format!("{}/indexes", CONTROLLER);
        let client = MockHttpClient::new().with_response(Method::GET, url.clone(), indexes());
        let provider = provider(client);

        let stores = provider.list_stores().await.unwrap();

        assert_eq!(stores.len(), 2);
        let sent = provider.client.last_request(Method::GET, &url).unwrap();
        assert_eq!(sent.header("Api-Key"), Some("pc-key"));
        assert_eq!(sent.header("X-Pinecone-API-Version"), Some("2024-07"));
    }

    #[tokio::test]
    async fn test_host_map_resolved_once() {
        let client = MockHttpClient::new()
            .with_response(Method::GET, format!("{}/indexes", CONTROLLER), indexes())
            .with_response(
                Method::POST,
                format!("{}/query", HOST),
                json!({"matches": [{"id": "v1", "score": 0.9, "metadata": {"text": "a"}}]}),
            );
        let provider = provider(client);
        let input = QueryInput::new("q").with_vector(vec![0.1; 4]).with_top_k(7);

        provider.query("docs", &input).await.unwrap();
        let matches = provider.query("docs", &input).await.unwrap();

        assert_eq!(matches.len(), 1);
        let listings = provider
            .client
            .requests()
            .iter()
            .filter(|r| r.method == Method::GET)
            .count();
        assert_eq!(listings, 1);

        let sent = provider
            .client
            .last_request(Method::POST, &format!("{}/query", HOST))
            .unwrap();
        let body = sent.body.unwrap();
        assert_eq!(body["topK"], 7);
        assert_eq!(body["includeMetadata"], true);
    }

    #[tokio::test]
    async fn test_unknown_index_falls_back_to_describe() {
        let client = MockHttpClient::new()
            .with_response(Method::GET, format!("{}/indexes", CONTROLLER), json!({"indexes": []}))
            .with_not_found(Method::GET, format!("{}/indexes/ghost", CONTROLLER));
        let provider = provider(client);

        let input = QueryInput::new("q").with_vector(vec![0.1; 4]);
        let err = provider.query("ghost", &input).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_described_index_name_is_encoded() {
        let client = MockHttpClient::new()
            .with_response(Method::GET, format!("{}/indexes", CONTROLLER), json!({"indexes": []}))
            .with_not_found(Method::GET, format!("{}/indexes/docs%2Fprod", CONTROLLER));
        let provider = provider(client);

        let input = QueryInput::new("q").with_vector(vec![0.1; 4]);
        let err = provider.query("docs/prod", &input).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_stores_text_in_metadata() {
        let url = format!("{}/vectors/upsert", HOST);
        let client = MockHttpClient::new()
            .with_response(Method::GET, format!("{}/indexes", CONTROLLER), indexes())
            .with_response(Method::POST, url.clone(), json!({"upsertedCount": 1}));
        let provider = PineconeKnowledgeBase::new(
            client,
            PineconeConfig::new("pc-key").with_namespace("kb"),
        )
        .unwrap();

        let payload = DocumentPayload::new(Document::new("hello")).with_embedding(vec![0.2; 4]);
        let result = provider.upsert("docs", &payload).await.unwrap();

        assert_eq!(result.ids.len(), 1);
        let body = provider.client.last_request(Method::POST, &url).unwrap().body.unwrap();
        assert_eq!(body["namespace"], "kb");
        assert_eq!(body["vectors"][0]["metadata"]["text"], "hello");
        assert_eq!(body["vectors"][0]["id"], result.ids[0].as_str());
    }

    #[tokio::test]
    async fn test_delete_checks_existence() {
        let client = MockHttpClient::new()
            .with_response(Method::GET, format!("{}/indexes", CONTROLLER), indexes())
            .with_response(
                Method::GET,
                format!("{}/vectors/fetch?ids=v1", HOST),
                json!({"vectors": {"v1": {"id": "v1"}}}),
            )
            .with_response(
                Method::GET,
                format!("{}/vectors/fetch?ids=v2", HOST),
                json!({"vectors": {}}),
            )
            .with_response(Method::POST, format!("{}/vectors/delete", HOST), json!({}));
        let provider = provider(client);

        assert!(provider.delete_by_id("docs", "v1").await.unwrap());
        assert!(provider.delete_by_id("docs", "v2").await.unwrap_err().is_not_found());

        let deletes = provider
            .client
            .requests()
            .iter()
            .filter(|r| r.url.ends_with("/vectors/delete"))
            .count();
        assert_eq!(deletes, 1);
    }
}
