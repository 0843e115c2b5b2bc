pub mod lancedb;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use self::lancedb::LanceStore;
pub use self::memory::MemoryStore;
use crate::Result;

/// Embedding record stored in the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Content-hash id of the chunk, the upsert key
    pub id: String,
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    /// Id of the corpus snippet the chunk was cut from
    pub snippet_id: String,
    /// Title of the source page
    pub page_title: String,
    /// URL of the source page
    pub page_url: String,
    /// The actual text content of the chunk
    pub content: String,
    pub token_count: u32,
    /// Index of this chunk within its snippet
    pub chunk_index: u32,
    /// Model that produced the vector
    pub embedding_model: String,
    /// RFC 3339 timestamp of when this embedding was created
    pub created_at: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// `1 - distance`; higher is more similar
    pub similarity_score: f32,
    /// Cosine distance to the query vector
    pub distance: f32,
}

/// Storage for chunk embeddings with nearest-neighbour search
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any existing record with the same id
    async fn upsert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Up to `limit` nearest records, most similar first, ties broken by
    /// chunk id
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    async fn count(&self) -> Result<u64>;

    /// Remove every record, forgetting the stored dimension
    async fn clear(&mut self) -> Result<()>;

    /// Vector dimension of the stored records, `None` while empty
    fn dimension(&self) -> Option<usize>;

    /// Distinct embedding models recorded in the store
    async fn embedding_models(&self) -> Result<BTreeSet<String>>;
}

/// Ascending distance, then chunk id
#[inline]
pub fn rank_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.chunk_metadata.chunk_id.cmp(&b.chunk_metadata.chunk_id))
    });
}

/// Cosine similarity; zero for empty, mismatched or zero-magnitude vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
