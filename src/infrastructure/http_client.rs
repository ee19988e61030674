//! JSON-over-HTTP client shared by every remote provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};

use crate::domain::DomainError;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    /// Send a request and decode the JSON response; an empty body decodes to `null`
    async fn request_json(
        &self,
        method: Method,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, DomainError>;

    async fn get_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<serde_json::Value, DomainError> {
        self.request_json(Method::GET, url, headers, None).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.request_json(Method::POST, url, headers, Some(body)).await
    }

    async fn put_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.request_json(Method::PUT, url, headers, Some(body)).await
    }

    async fn delete_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<serde_json::Value, DomainError> {
        self.request_json(Method::DELETE, url, headers, None).await
    }
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a non-success status to the domain taxonomy
fn status_error(method: &Method, url: &str, status: StatusCode, body: &str) -> DomainError {
    if status == StatusCode::NOT_FOUND {
        return DomainError::not_found(format!("{} {} returned 404: {}", method, url, body));
    }

    DomainError::provider("http", format!("HTTP {}: {}", status, body))
}

/// Append path segments to a base URL, percent-encoding each one
pub fn join_segments(base: &str, segments: &[&str]) -> Result<String, DomainError> {
    let mut url = Url::parse(base)
        .map_err(|e| DomainError::configuration(format!("Invalid base URL '{}': {}", base, e)))?;

    url.path_segments_mut()
        .map_err(|_| DomainError::configuration(format!("Base URL '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);

    Ok(url.into())
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn request_json(
        &self,
        method: Method,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, DomainError> {
        let mut request = self.client.request(method.clone(), url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::provider("http", format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(&method, url, status, &text));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| DomainError::provider("http", format!("Failed to parse response: {}", e)))
    }
}
