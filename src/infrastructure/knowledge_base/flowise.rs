//! Flowise document-store provider implementation

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::knowledge_base::{
    ChunkPage, ChunkStore, ChunkUpdate, Document, DocumentChunk, DocumentPayload, DocumentStore,
    KnowledgeBaseProvider, Metadata, ProviderSource, QueryInput, RawMatch, SearchResult,
    UpsertResult,
};
use crate::domain::DomainError;
use crate::infrastructure::http_client::{join_segments, HttpClientTrait};

/// Flowise does not score lookups; every hit carries this constant instead.
/// It is not comparable with the scores of vector backends.
pub const FLOWISE_PLACEHOLDER_SIMILARITY: f32 = 0.0;

const DEFAULT_DOC_STORE_NAME: &str = "LobeChat Document";

/// Configuration for a Flowise deployment
#[derive(Clone)]
pub struct FlowiseConfig {
    /// API base URL, e.g. `https://flowise.example.com/api/v1`
    pub api_url: String,
    pub api_key: String,
    /// Key forwarded to Flowise's own embedding step during upserts
    pub embedding_api_key: Option<String>,
}

impl Debug for FlowiseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowiseConfig")
            .field("api_url", &self.api_url)
            .field("has_embedding_api_key", &self.embedding_api_key.is_some())
            .finish()
    }
}

impl FlowiseConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            embedding_api_key: None,
        }
    }

    pub fn with_embedding_api_key(mut self, key: impl Into<String>) -> Self {
        self.embedding_api_key = Some(key.into());
        self
    }
}

/// Named pipeline component in an upsert request
#[derive(Debug, Clone, Serialize)]
pub struct FlowiseComponent {
    pub name: String,
    pub config: Value,
}

impl FlowiseComponent {
    pub fn new(name: impl Into<String>, config: Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowiseDocStoreInfo {
    pub name: String,
    pub description: String,
}

/// Body of `POST /document-store/upsert/{storeId}`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowiseUpsertRequest {
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_store: Option<FlowiseDocStoreInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<FlowiseComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splitter: Option<FlowiseComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<FlowiseComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_store: Option<FlowiseComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_manager: Option<FlowiseComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_existing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_new_doc_store: Option<bool>,
}

impl FlowiseUpsertRequest {
    /// Text-loader pipeline used for every document ingested through the gateway
    pub fn for_document(document: &Document, embedding_api_key: Option<&str>) -> Self {
        let name = match document.metadata_str("title") {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => DEFAULT_DOC_STORE_NAME.to_string(),
        };
        let description = document.metadata_str("description").unwrap_or_default().to_string();

        let embedding_config = match embedding_api_key {
            Some(key) => json!({ "openAIApiKey": key }),
            None => json!({}),
        };

        Self {
            metadata: document.metadata.clone(),
            doc_store: Some(FlowiseDocStoreInfo { name, description }),
            loader: Some(FlowiseComponent::new(
                "text",
                json!({ "text": document.content }),
            )),
            splitter: Some(FlowiseComponent::new("recursiveCharacterTextSplitter", json!({}))),
            embedding: Some(FlowiseComponent::new("openAIEmbeddings", embedding_config)),
            ..Default::default()
        }
    }
}

/// Flowise document-store provider
pub struct FlowiseKnowledgeBase<C: HttpClientTrait> {
    client: C,
    base_url: String,
    auth_header: String,
    embedding_api_key: Option<String>,
}

impl<C: HttpClientTrait> Debug for FlowiseKnowledgeBase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowiseKnowledgeBase")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl<C: HttpClientTrait> FlowiseKnowledgeBase<C> {
    /// Create a new Flowise provider, rejecting incomplete configuration
    pub fn new(client: C, config: FlowiseConfig) -> Result<Self, DomainError> {
        if config.api_url.trim().is_empty() || config.api_key.trim().is_empty() {
            return Err(DomainError::configuration("Missing Flowise configuration"));
        }

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {}", config.api_key),
            embedding_api_key: config.embedding_api_key,
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn url(&self, segments: &[&str]) -> Result<String, DomainError> {
        let mut path = vec!["document-store"];
        path.extend_from_slice(segments);
        join_segments(&self.base_url, &path)
    }

    fn provider_error(e: DomainError) -> DomainError {
        match e {
            DomainError::ProviderUnavailable { message, .. } => {
                DomainError::provider(ProviderSource::Flowise.as_str(), message)
            }
            other => other,
        }
    }

    /// Send a prepared upsert request to a store
    pub async fn upsert_request(
        &self,
        store_id: &str,
        request: &FlowiseUpsertRequest,
    ) -> Result<Value, DomainError> {
        let body = serde_json::to_value(request)
            .map_err(|e| DomainError::internal(format!("Failed to encode upsert request: {}", e)))?;

        self.client
            .post_json(&self.url(&["upsert", store_id])?, self.headers(), &body)
            .await
            .map_err(Self::provider_error)
    }
}

#[async_trait]
impl<C: HttpClientTrait> KnowledgeBaseProvider for FlowiseKnowledgeBase<C> {
    fn source(&self) -> ProviderSource {
        ProviderSource::Flowise
    }

    fn requires_embedding(&self) -> bool {
        false
    }

    async fn list_stores(&self) -> Result<Vec<DocumentStore>, DomainError> {
        let response = self
            .client
            .get_json(&self.url(&["store"])?, self.headers())
            .await
            .map_err(Self::provider_error)?;

        match response {
            Value::Array(items) => items.iter().map(normalize_store).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(DomainError::provider(
                "flowise",
                format!("Unexpected store listing: {}", other),
            )),
        }
    }

    async fn get_store(&self, id: &str) -> Result<DocumentStore, DomainError> {
        let response = self
            .client
            .get_json(&self.url(&["store", id])?, self.headers())
            .await
            .map_err(Self::provider_error)?;

        if response.is_null() {
            return Err(DomainError::not_found(format!("Document store '{}' not found", id)));
        }

        normalize_store(&response)
    }

    async fn upsert(
        &self,
        store_id: &str,
        payload: &DocumentPayload,
    ) -> Result<UpsertResult, DomainError> {
        let request = FlowiseUpsertRequest::for_document(
            &payload.document,
            self.embedding_api_key.as_deref(),
        );
        let raw = self.upsert_request(store_id, &request).await?;

        let ids = raw
            .get("docId")
            .and_then(Value::as_str)
            .map(|id| vec![id.to_string()])
            .unwrap_or_default();

        Ok(UpsertResult::new(ids, raw))
    }

    async fn query(
        &self,
        store_id: &str,
        input: &QueryInput,
    ) -> Result<Vec<RawMatch>, DomainError> {
        let body = json!({ "storeId": store_id, "query": input.text });

        let response = self
            .client
            .post_json(&self.url(&["vectorstore", "query"])?, self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        match response.get("docs") {
            Some(Value::Array(docs)) => Ok(docs.clone()),
            _ => Ok(Vec::new()),
        }
    }

    fn normalize(&self, store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError> {
        normalize_match(store, raw)
    }

    async fn delete_by_id(&self, store_id: &str, id: &str) -> Result<bool, DomainError> {
        self.client
            .delete_json(&self.url(&["loader", store_id, id])?, self.headers())
            .await
            .map_err(Self::provider_error)?;

        Ok(true)
    }
}

#[async_trait]
impl<C: HttpClientTrait> ChunkStore for FlowiseKnowledgeBase<C> {
    async fn list_chunks(
        &self,
        store_id: &str,
        document_id: &str,
        page: u32,
    ) -> Result<ChunkPage, DomainError> {
        let page_segment = page.to_string();
        let url = self.url(&["chunks", store_id, document_id, &page_segment])?;
        let response = self
            .client
            .get_json(&url, self.headers())
            .await
            .map_err(Self::provider_error)?;

        Ok(normalize_chunk_page(&response, page))
    }

    async fn update_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: &ChunkUpdate,
    ) -> Result<DocumentChunk, DomainError> {
        let url = self.url(&["chunks", store_id, document_id, chunk_id])?;
        let body = json!({ "pageContent": update.content, "metadata": update.metadata });

        let response = self
            .client
            .put_json(&url, self.headers(), &body)
            .await
            .map_err(Self::provider_error)?;

        // Flowise answers with the refreshed chunk page
        let updated = normalize_chunk_page(&response, 1)
            .chunks
            .into_iter()
            .find(|c| c.id == chunk_id);

        Ok(updated.unwrap_or_else(|| DocumentChunk {
            id: chunk_id.to_string(),
            document_id: Some(document_id.to_string()),
            store_id: Some(store_id.to_string()),
            content: update.content.clone(),
            metadata: update.metadata.clone(),
            chunk_no: None,
        }))
    }

    async fn delete_chunk(
        &self,
        store_id: &str,
        document_id: &str,
        chunk_id: &str,
    ) -> Result<bool, DomainError> {
        let url = self.url(&["chunks", store_id, document_id, chunk_id])?;
        self.client
            .delete_json(&url, self.headers())
            .await
            .map_err(Self::provider_error)?;

        Ok(true)
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Flowise stores some object fields as JSON-encoded strings
fn decode_embedded_json(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

fn metadata_object(value: Option<&Value>) -> Metadata {
    match decode_embedded_json(value) {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => Metadata::new(),
    }
}

/// Map a Flowise store record into a [`DocumentStore`]
pub fn normalize_store(value: &Value) -> Result<DocumentStore, DomainError> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::provider("flowise", "Document store record without id"))?;

    let mut store = DocumentStore::new(ProviderSource::Flowise, id)
        .with_timestamps(
            parse_timestamp(value.get("createdDate")),
            parse_timestamp(value.get("updatedDate")),
        );

    if let Some(name) = value.get("name").and_then(Value::as_str) {
        store = store.with_name(name);
    }
    if let Some(description) = value.get("description").and_then(Value::as_str) {
        store = store.with_description(description);
    }
    if let Some(status) = value.get("status").and_then(Value::as_str) {
        store = store.with_status(status);
    }

    let document_count = value
        .get("documentCount")
        .and_then(Value::as_u64)
        .or_else(|| match decode_embedded_json(value.get("loaders")) {
            Some(Value::Array(loaders)) => Some(loaders.len() as u64),
            _ => None,
        })
        .unwrap_or(0);

    Ok(store.with_document_count(document_count))
}

/// Map a Flowise `{pageContent, metadata}` doc into a [`SearchResult`]
pub fn normalize_match(store: &DocumentStore, raw: RawMatch) -> Result<SearchResult, DomainError> {
    let content = raw
        .get("pageContent")
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::provider("flowise", "Query result without pageContent"))?;

    Ok(SearchResult::new(content)
        .with_metadata(metadata_object(raw.get("metadata")))
        .with_store(store)
        .with_similarity(FLOWISE_PLACEHOLDER_SIMILARITY))
}

fn normalize_chunk(value: &Value) -> Option<DocumentChunk> {
    let id = value.get("id").and_then(Value::as_str)?;
    let content = value.get("pageContent").and_then(Value::as_str).unwrap_or_default();

    Some(DocumentChunk {
        id: id.to_string(),
        document_id: value.get("docId").and_then(Value::as_str).map(String::from),
        store_id: value.get("storeId").and_then(Value::as_str).map(String::from),
        content: content.to_string(),
        metadata: metadata_object(value.get("metadata")),
        chunk_no: value.get("chunkNo").and_then(Value::as_u64),
    })
}

fn normalize_chunk_page(value: &Value, page: u32) -> ChunkPage {
    let chunks: Vec<DocumentChunk> = value
        .get("chunks")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_chunk).collect())
        .unwrap_or_default();

    ChunkPage {
        count: value
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(chunks.len() as u64),
        current_page: value
            .get("currentPage")
            .and_then(Value::as_u64)
            .map(|p| p as u32)
            .unwrap_or(page),
        chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::mock::MockHttpClient;
    use reqwest::Method;

    const BASE: &str = "http://flowise.test/api/v1";

    fn provider(client: MockHttpClient) -> FlowiseKnowledgeBase<MockHttpClient> {
        FlowiseKnowledgeBase::new(
            client,
            FlowiseConfig::new(format!("{}/", BASE), "flowise-key")
                .with_embedding_api_key("sk-openai"),
        )
        .unwrap()
    }

    fn store_json(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "description": "Support articles",
            "status": "SYNC",
            "loaders": "[{\"id\":\"l1\"},{\"id\":\"l2\"}]",
            "createdDate": "2024-05-01T10:00:00.000Z",
            "updatedDate": "2024-05-02T10:00:00.000Z"
        })
    }

    #[test]
    fn test_missing_configuration_rejected() {
        let result =
            FlowiseKnowledgeBase::new(MockHttpClient::new(), FlowiseConfig::new("", "key"));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));

        let result =
            FlowiseKnowledgeBase::new(MockHttpClient::new(), FlowiseConfig::new(BASE, " "));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_normalize_store() {
        let store = normalize_store(&store_json("s1", "Support")).unwrap();

        assert_eq!(store.id, "s1");
        assert_eq!(store.name, "Support");
        assert_eq!(store.description, "Support articles");
        assert_eq!(store.status, "SYNC");
        assert_eq!(store.provider, ProviderSource::Flowise);
        assert_eq!(store.document_count, Some(2));
        assert!(store.created_at.is_some());
        assert!(store.updated_at.is_some());
    }

    #[test]
    fn test_normalize_store_without_optional_fields() {
        let store = normalize_store(&json!({"id": "bare"})).unwrap();

        assert_eq!(store.name, "bare");
        assert_eq!(store.description, "");
        assert_eq!(store.document_count, Some(0));
        assert!(normalize_store(&json!({"name": "no id"})).is_err());
    }

    #[test]
    fn test_normalize_match() {
        let store = DocumentStore::new(ProviderSource::Flowise, "s1").with_name("Support");
        let raw = json!({"pageContent": "Refunds take 5 days", "metadata": {"source": "faq.md"}});

        let result = normalize_match(&store, raw).unwrap();

        assert_eq!(result.content, "Refunds take 5 days");
        assert_eq!(result.metadata["source"], "faq.md");
        assert_eq!(result.store_id.as_deref(), Some("s1"));
        assert_eq!(result.store_name.as_deref(), Some("Support"));
        assert_eq!(result.similarity, Some(FLOWISE_PLACEHOLDER_SIMILARITY));
    }

    #[test]
    fn test_upsert_request_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), json!("Refund policy"));
        let document = Document::new("Refunds take 5 days").with_metadata(metadata);

        let request = FlowiseUpsertRequest::for_document(&document, Some("sk-openai"));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "metadata": {"title": "Refund policy"},
                "docStore": {"name": "Refund policy", "description": ""},
                "loader": {"name": "text", "config": {"text": "Refunds take 5 days"}},
                "splitter": {"name": "recursiveCharacterTextSplitter", "config": {}},
                "embedding": {"name": "openAIEmbeddings", "config": {"openAIApiKey": "sk-openai"}}
            })
        );
    }

    #[test]
    fn test_upsert_request_defaults_doc_store_name() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), json!(""));
        metadata.insert("description".into(), json!("From chat"));
        let document = Document::new("text").with_metadata(metadata);

        let body =
            serde_json::to_value(FlowiseUpsertRequest::for_document(&document, None)).unwrap();

        assert_eq!(body["docStore"]["name"], DEFAULT_DOC_STORE_NAME);
        assert_eq!(body["docStore"]["description"], "From chat");
        assert_eq!(body["embedding"]["config"], json!({}));
    }

    #[tokio::test]
    async fn test_list_stores() {
        let client = MockHttpClient::new().with_response(
            Method::GET,
            format!("{}/document-store/store", BASE),
            json!([store_json("s1", "Support"), store_json("s2", "Billing")]),
        );
        let provider = provider(client);

        let stores = provider.list_stores().await.unwrap();

        assert_eq!(stores.len(), 2);
        assert_eq!(stores[1].name, "Billing");
    }

    #[tokio::test]
    async fn test_get_store_not_found() {
        let client = MockHttpClient::new()
            .with_not_found(Method::GET, format!("{}/document-store/store/missing", BASE));
        let provider = provider(client);

        let err = provider.get_store("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_query_sends_store_and_text() {
        let url = format!("{}/document-store/vectorstore/query", BASE);
        let client = MockHttpClient::new().with_response(
            Method::POST,
            url.clone(),
            json!({
                "docs": [{"pageContent": "a", "metadata": {}}, {"pageContent": "b"}],
                "timeTaken": 12
            }),
        );
        let provider = provider(client);

        let docs = provider
            .query("s1", &QueryInput::new("refund policy"))
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        let sent = provider.client.last_request(Method::POST, &url).unwrap();
        assert_eq!(sent.header("Authorization"), Some("Bearer flowise-key"));
        assert_eq!(
            sent.body.as_ref(),
            Some(&json!({"storeId": "s1", "query": "refund policy"}))
        );
    }

    #[tokio::test]
    async fn test_upsert_posts_to_store() {
        let url = format!("{}/document-store/upsert/s1", BASE);
        let client = MockHttpClient::new().with_response(
            Method::POST,
            url.clone(),
            json!({"numAdded": 1, "docId": "loader-9"}),
        );
        let provider = provider(client);

        let result = provider
            .upsert("s1", &DocumentPayload::new(Document::new("hello")))
            .await
            .unwrap();

        assert_eq!(result.ids, vec!["loader-9".to_string()]);
        let sent = provider.client.last_request(Method::POST, &url).unwrap();
        assert_eq!(sent.body.unwrap()["loader"]["config"]["text"], "hello");
    }

    #[tokio::test]
    async fn test_delete_loader() {
        let client = MockHttpClient::new()
            .with_response(
                Method::DELETE,
                format!("{}/document-store/loader/s1/l1", BASE),
                Value::Null,
            )
            .with_not_found(Method::DELETE, format!("{}/document-store/loader/s1/l2", BASE));
        let provider = provider(client);

        assert!(provider.delete_by_id("s1", "l1").await.unwrap());
        assert!(provider.delete_by_id("s1", "l2").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_ids_are_encoded_as_single_path_segments() {
        let client = MockHttpClient::new()
            .with_response(
                Method::DELETE,
                format!("{}/document-store/loader/team%2Fa/doc%3F1", BASE),
                Value::Null,
            )
            .with_not_found(Method::GET, format!("{}/document-store/store/..%2Fadmin", BASE));
        let provider = provider(client);

        assert!(provider.delete_by_id("team/a", "doc?1").await.unwrap());
        assert!(provider.get_store("../admin").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_query_failure_is_labelled_flowise() {
        let client = MockHttpClient::new().with_error(
            Method::POST,
            format!("{}/document-store/vectorstore/query", BASE),
            "connection reset",
        );
        let provider = provider(client);

        let err = provider.query("s1", &QueryInput::new("q")).await.unwrap_err();
        match err {
            DomainError::ProviderUnavailable { provider, .. } => assert_eq!(provider, "flowise"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_chunks_decodes_string_metadata() {
        let client = MockHttpClient::new().with_response(
            Method::GET,
            format!("{}/document-store/chunks/s1/all/2", BASE),
            json!({
                "chunks": [{
                    "id": "c1",
                    "docId": "l1",
                    "storeId": "s1",
                    "chunkNo": 3,
                    "pageContent": "chunk text",
                    "metadata": "{\"source\":\"faq.md\"}"
                }],
                "count": 41,
                "currentPage": 2
            }),
        );
        let provider = provider(client);

        let page = provider.list_chunks("s1", "all", 2).await.unwrap();

        assert_eq!(page.count, 41);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.chunks[0].metadata["source"], "faq.md");
        assert_eq!(page.chunks[0].chunk_no, Some(3));
    }

    #[tokio::test]
    async fn test_update_chunk_falls_back_to_request() {
        let url = format!("{}/document-store/chunks/s1/l1/c1", BASE);
        let client = MockHttpClient::new().with_response(Method::PUT, url.clone(), json!({}));
        let provider = provider(client);

        let update = ChunkUpdate {
            content: "edited".into(),
            metadata: Metadata::new(),
        };
        let chunk = provider.update_chunk("s1", "l1", "c1", &update).await.unwrap();

        assert_eq!(chunk.content, "edited");
        let sent = provider.client.last_request(Method::PUT, &url).unwrap();
        assert_eq!(sent.body.unwrap()["pageContent"], "edited");
    }
}
