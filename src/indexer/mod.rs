
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::corpus::{Corpus, CorpusSnippet};
use crate::database::{ChunkMetadata, EmbeddingRecord, VectorStore};
use crate::embeddings::Embedder;
use crate::embeddings::chunking::{ChunkingConfig, ContentChunk, chunk_snippet};
use crate::{LoreError, Result};

const DEFAULT_BATCH_SIZE: usize = 16;

/// Statistics about one indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub snippets_processed: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    /// Chunks dropped because an identical chunk of the same snippet was
    /// already queued
    pub chunks_skipped: usize,
}

/// Chunks a corpus, embeds the chunks and upserts them into a vector store
pub struct Indexer<'a> {
    embedder: &'a dyn Embedder,
    store: &'a mut dyn VectorStore,
    chunking_config: ChunkingConfig,
    batch_size: usize,
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(
        embedder: &'a dyn Embedder,
        store: &'a mut dyn VectorStore,
        chunking_config: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking_config,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index every snippet of the corpus
    ///
    /// With `rebuild` every chunk is embedded before the store is cleared, so
    /// a failing embedder leaves the previous index untouched. Without it a
    /// store built by a different embedding model or dimension is refused.
    #[inline]
    pub async fn index_corpus(&mut self, corpus: &Corpus, rebuild: bool) -> Result<IndexingStats> {
        if !rebuild {
            self.ensure_same_model().await?;
        }

        let mut stats = IndexingStats {
            snippets_processed: corpus.len(),
            ..IndexingStats::default()
        };

        let mut seen = HashSet::new();
        let mut pending: Vec<(ContentChunk, &CorpusSnippet)> = Vec::new();
        for snippet in &corpus.snippets {
            let chunks = chunk_snippet(snippet, &self.chunking_config);
            if chunks.is_empty() {
                warn!("Snippet '{}' produced no chunks", snippet.title);
            }
            for chunk in chunks {
                stats.chunks_created += 1;
                if seen.insert(chunk.id.clone()) {
                    pending.push((chunk, snippet));
                } else {
                    stats.chunks_skipped += 1;
                }
            }
        }

        info!(
            "Chunked {} snippets into {} chunks",
            stats.snippets_processed, stats.chunks_created
        );

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(pending.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let created_at = Utc::now().to_rfc3339();
        let mut staged: Vec<EmbeddingRecord> = Vec::new();
        for batch in pending.chunks(self.batch_size) {
            let records = self.embed_records(batch, &created_at)?;
            stats.embeddings_generated += records.len();

            if rebuild {
                if let Some(first) = staged.first().or_else(|| records.first()) {
                    ensure_uniform_dimension(first.vector.len(), &records)?;
                }
                staged.extend(records);
            } else {
                self.ensure_same_dimension(&records)?;
                self.store.upsert(records).await?;
                debug!("Stored batch of {} embeddings", batch.len());
            }
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        if rebuild {
            info!("Rebuild requested, replacing vector store contents");
            self.store.clear().await?;
            self.store.upsert(staged).await?;
        }

        info!(
            "Indexed {} chunks ({} embeddings, {} skipped)",
            stats.chunks_created, stats.embeddings_generated, stats.chunks_skipped
        );
        Ok(stats)
    }

    fn embed_records(
        &self,
        batch: &[(ContentChunk, &CorpusSnippet)],
        created_at: &str,
    ) -> Result<Vec<EmbeddingRecord>> {
        let texts: Vec<String> = batch.iter().map(|(chunk, _)| chunk.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        if embeddings.len() != batch.len() {
            return Err(LoreError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                embeddings.len()
            )));
        }

        Ok(batch
            .iter()
            .zip(embeddings)
            .map(|((chunk, snippet), vector)| EmbeddingRecord {
                id: chunk.id.clone(),
                vector,
                metadata: ChunkMetadata {
                    chunk_id: chunk.id.clone(),
                    snippet_id: chunk.snippet_id.clone(),
                    page_title: snippet.title.clone(),
                    page_url: snippet.url.clone(),
                    content: chunk.content.clone(),
                    token_count: chunk.token_count as u32,
                    chunk_index: chunk.chunk_index as u32,
                    embedding_model: self.embedder.model_name().to_string(),
                    created_at: created_at.to_string(),
                },
            })
            .collect())
    }

    async fn ensure_same_model(&self) -> Result<()> {
        let models = self.store.embedding_models().await?;
        let current = self.embedder.model_name();

        if let Some(other) = models.iter().find(|model| model.as_str() != current) {
            return Err(LoreError::EmbeddingMismatch(format!(
                "store was built with '{other}' but the configured model is '{current}'; re-run with --rebuild"
            )));
        }
        Ok(())
    }

    fn ensure_same_dimension(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let Some(expected) = self.store.dimension() else {
            return Ok(());
        };

        match records.iter().find(|r| r.vector.len() != expected) {
            Some(record) => Err(LoreError::EmbeddingMismatch(format!(
                "store holds {expected}-dimensional vectors but '{}' produced {}; re-run with --rebuild",
                self.embedder.model_name(),
                record.vector.len()
            ))),
            None => Ok(()),
        }
    }
}

fn ensure_uniform_dimension(expected: usize, records: &[EmbeddingRecord]) -> Result<()> {
    match records.iter().find(|r| r.vector.len() != expected) {
        Some(record) => Err(LoreError::DimensionMismatch {
            expected,
            actual: record.vector.len(),
        }),
        None => Ok(()),
    }
}
