//! In-memory [`VectorStore`] for tests and throwaway indexes.
//!
//! Vector search is brute-force cosine similarity over all stored vectors.


use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use super::{EmbeddingRecord, SearchResult, VectorStore, cosine_similarity, rank_results};
use crate::{LoreError, Result};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<String, EmbeddingRecord>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let Some(expected) = self
            .dimension()
            .or_else(|| records.first().map(|r| r.vector.len()))
        else {
            return Ok(());
        };

        if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
            return Err(LoreError::DimensionMismatch {
                expected,
                actual: bad.vector.len(),
            });
        }

        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if let Some(expected) = self.dimension().filter(|d| *d != query_vector.len()) {
            return Err(LoreError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }

        let mut results: Vec<SearchResult> = self
            .records
            .values()
            .map(|record| {
                let similarity = cosine_similarity(query_vector, &record.vector);
                SearchResult {
                    chunk_metadata: record.metadata.clone(),
                    similarity_score: similarity,
                    distance: 1.0 - similarity,
                }
            })
            .collect();

        rank_results(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    async fn clear(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }

    fn dimension(&self) -> Option<usize> {
        self.records.values().next().map(|r| r.vector.len())
    }

    async fn embedding_models(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .records
            .values()
            .map(|r| r.metadata.embedding_model.clone())
            .collect())
    }
}
