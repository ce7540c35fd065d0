//! FastEmbed-backed embedding provider

use crate::embedding::EmbeddingProvider;
use crate::error::{PassimError, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

/// Local embedding provider.
///
/// Models are downloaded on first use to the huggingface cache; the default
/// all-MiniLM-L6-v2 is ~90MB and produces 384-dimension vectors.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(PassimError::Embedding(format!(
                    "Unsupported model: {model_name}. Supported: all-MiniLM-L6-v2, \
                     bge-small-en-v1.5, bge-base-en-v1.5"
                )));
            }
        };

        tracing::info!(model = model_name, dimension, "initializing embedding model");

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| PassimError::Embedding(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    pub fn with_default_model() -> Result<Self> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| PassimError::Embedding(e.to_string()))?;

        let embedding = embeddings
            .pop()
            .ok_or_else(|| PassimError::Embedding("no embedding produced".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(PassimError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Inputs pass through as-is: the batch contract is 1:1 with output
        // order, so no filtering even for empty strings.
        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| PassimError::Embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(PassimError::Embedding(format!(
                "batch produced {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(PassimError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_rejected() {
        assert!(FastEmbedProvider::new("definitely-not-a-model").is_err());
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider.embed("Either party may terminate this Agreement.").unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_batch_preserves_order() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "governing law of the State of Delaware".to_string(),
            "confidential information of the disclosing party".to_string(),
        ];

        let batch = provider.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);

        let single = provider.embed(&texts[0]).unwrap();
        let dot: f32 = batch[0].iter().zip(single.iter()).map(|(a, b)| a * b).sum();
        // Same text encodes to (essentially) the same vector in batch or alone
        assert!(dot > 0.99);
    }
}
