pub mod chunking;

pub use chunking::{ChunkingConfig, ContentChunk, chunk_corpus, chunk_snippet, estimate_token_count};

/// Turns text into a fixed-length vector
///
/// Corpus chunks and queries must be embedded by the same implementation for
/// their similarities to be meaningful.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded alongside every vector
    fn model_name(&self) -> &str;

    fn embed(&self, text: &str) -> crate::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
