//! OpenAI embedding provider implementation

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedding::{Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// OpenAI (or OpenAI-compatible) embedding provider
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    /// Create a new OpenAI embedding provider
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    /// Create a new provider with custom base URL
    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Use a different embedding model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<EmbeddingResponse, DomainError> {
        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        let embeddings = response
            .data
            .into_iter()
            .map(|d| Embedding::new(d.index, d.embedding))
            .collect();

        Ok(EmbeddingResponse::new(response.model, embeddings))
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        let body = serde_json::to_value(&request)
            .map_err(|e| {
                DomainError::internal(format!("Failed to encode embedding request: {}", e))
            })?;

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API types for embeddings

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    model: String,
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::mock::MockHttpClient;
    use reqwest::Method;

    const TEST_URL: &str = "https://api.openai.com/v1/embeddings";

    fn create_mock_response(num_embeddings: usize, dimensions: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..num_embeddings)
            .map(|i| {
                let embedding: Vec<f32> = (0..dimensions).map(|j| (i + j) as f32 * 0.001).collect();
                serde_json::json!({
                    "index": i,
                    "embedding": embedding,
                    "object": "embedding"
                })
            })
            .collect();

        serde_json::json!({
            "model": "text-embedding-3-small",
            "data": data,
            "usage": {"prompt_tokens": 10, "total_tokens": 10}
        })
    }

    #[tokio::test]
    async fn test_embed_text() {
        let client = MockHttpClient::new().with_response(
            Method::POST,
            TEST_URL,
            create_mock_response(1, 1536),
        );
        let provider = OpenAiEmbeddingProvider::new(client, "test-api-key");

        let vector = provider.embed_text("refund policy").await.unwrap();

        assert_eq!(vector.len(), 1536);
    }

    #[tokio::test]
    async fn test_embed_sends_model_and_auth() {
        let client = MockHttpClient::new().with_response(
            Method::POST,
            TEST_URL,
            create_mock_response(2, 4),
        );
        let provider =
            OpenAiEmbeddingProvider::new(client, "sk-test").with_model("text-embedding-3-large");

        let request = EmbeddingRequest::batch(provider.model(), vec!["a".into(), "b".into()]);
        let response = provider.embed(request).await.unwrap();
        assert_eq!(response.embeddings().len(), 2);

        let sent = provider.client.last_request(Method::POST, TEST_URL).unwrap();
        assert_eq!(sent.header("Authorization"), Some("Bearer sk-test"));
        let body = sent.body.unwrap();
        assert_eq!(body["model"], "text-embedding-3-large");
        assert_eq!(body["input"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_embed_error() {
        let client =
            MockHttpClient::new().with_error(Method::POST, TEST_URL, "Rate limit exceeded");
        let provider = OpenAiEmbeddingProvider::new(client, "test-api-key");

        let result = provider.embed_text("Hello").await;

        assert!(matches!(result, Err(DomainError::ProviderUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_custom_base_url() {
        let custom_url = "http://localhost:8080/v1/embeddings";
        let client = MockHttpClient::new().with_response(
            Method::POST,
            custom_url,
            create_mock_response(1, 8),
        );
        let provider =
            OpenAiEmbeddingProvider::with_base_url(client, "test-key", "http://localhost:8080/");

        let vector = provider.embed_text("Test").await.unwrap();

        assert_eq!(vector.len(), 8);
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let client = MockHttpClient::new().with_response(
            Method::POST,
            TEST_URL,
            serde_json::json!({"unexpected": true}),
        );
        let provider = OpenAiEmbeddingProvider::new(client, "test-key");

        assert!(provider.embed_text("Test").await.is_err());
    }

    #[test]
    fn test_provider_info() {
        let provider = OpenAiEmbeddingProvider::new(MockHttpClient::new(), "test-key");

        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model(), "text-embedding-3-small");
    }
}
