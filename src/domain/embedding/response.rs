//! Embedding response types

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A single embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// Index of the input this vector belongs to
    pub index: usize,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(index: usize, vector: Vec<f32>) -> Self {
        Self { index, vector }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Response from an embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub model: String,
    pub data: Vec<Embedding>,
}

impl EmbeddingResponse {
    pub fn new(model: impl Into<String>, mut data: Vec<Embedding>) -> Self {
        data.sort_by_key(|e| e.index);
        Self {
            model: model.into(),
            data,
        }
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.data
    }

    /// Consume the response and return the vector of the first input
    pub fn into_first_vector(self) -> Result<Vec<f32>, DomainError> {
        self.data
            .into_iter()
            .next()
            .map(|e| e.vector)
            .ok_or_else(|| DomainError::internal("Embedding response contained no vectors"))
    }
}
