//! Embedding generation
//!
//! The embedding model is an external collaborator; the crate only depends
//! on the [`EmbeddingProvider`] seam. The shipped implementation runs
//! fastembed locally with all-MiniLM-L6-v2 (384 dimensions), matching the
//! dimensionality the index is configured for.

mod provider;

pub use provider::FastEmbedProvider;

use crate::error::Result;

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    ///
    /// Output order is strictly 1:1 with input order; implementations must
    /// not drop, reorder, or deduplicate inputs.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The fixed output dimension of this model
    fn dimension(&self) -> usize;

    /// Model identifier
    fn model_name(&self) -> &str;
}
