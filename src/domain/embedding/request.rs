//! Embedding request types

use serde::{Deserialize, Serialize};

/// Request to embed one or more texts with a given model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a request for a single text
    pub fn single(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::batch(model, vec![text.into()])
    }

    /// Create a request for multiple texts
    pub fn batch(model: impl Into<String>, texts: Vec<String>) -> Self {
        Self {
            model: model.into(),
            input: texts,
            dimensions: None,
        }
    }

    /// Ask the backend to shorten vectors, for models that support it
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn inputs(&self) -> &[String] {
        &self.input
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_request() {
        let request = EmbeddingRequest::single("text-embedding-3-small", "refund policy");

        assert_eq!(request.model(), "text-embedding-3-small");
        assert_eq!(request.inputs(), ["refund policy".to_string()]);
        assert_eq!(request.dimensions(), None);
    }

    #[test]
    fn test_request_serialization_skips_dimensions() {
        let request = EmbeddingRequest::batch("m", vec!["a".into(), "b".into()]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
        assert!(json.get("dimensions").is_none());

        let json = serde_json::to_value(request.with_dimensions(256)).unwrap();
        assert_eq!(json["dimensions"], 256);
    }
}
