pub mod prompt;


use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use self::prompt::{SYSTEM_PROMPT, build_prompt};
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::Embedder;
use crate::generation::Generator;
use crate::{LoreError, Result};

/// Fixed reply used when retrieval finds nothing to ground an answer on
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information in the Minecraft lore corpus to answer that question.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// One retrieved chunk with its 1-based rank
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub rank: usize,
    pub chunk_id: String,
    pub snippet_id: String,
    pub page_title: String,
    pub page_url: String,
    pub content: String,
    pub similarity_score: f32,
    pub distance: f32,
}

impl RetrievedChunk {
    fn from_result(rank: usize, result: SearchResult) -> Self {
        let metadata = result.chunk_metadata;
        Self {
            rank,
            chunk_id: metadata.chunk_id,
            snippet_id: metadata.snippet_id,
            page_title: metadata.page_title,
            page_url: metadata.page_url,
            content: metadata.content,
            similarity_score: result.similarity_score,
            distance: result.distance,
        }
    }
}

/// The question and the chunks retrieved for it, most similar first
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub query: String,
    pub chunks: Vec<RetrievedChunk>,
}

impl Context {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub context: Context,
    /// Set when the context was empty and the model was not consulted
    pub insufficient_context: bool,
}

/// Retrieve then generate, with every collaborator passed in explicitly
pub struct QueryPipeline<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    generator: &'a dyn Generator,
    config: RetrievalConfig,
}

impl<'a> QueryPipeline<'a> {
    #[inline]
    pub fn new(
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
        generator: &'a dyn Generator,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            config,
        }
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.config.top_k
    }

    /// Embed the query and fetch the `top_k` nearest chunks
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Context> {
        let models = self.store.embedding_models().await?;
        let current = self.embedder.model_name();
        if let Some(other) = models.iter().find(|model| model.as_str() != current) {
            return Err(LoreError::EmbeddingMismatch(format!(
                "store was built with '{other}' but queries are embedded with '{current}'"
            )));
        }

        let query_vector = self.embedder.embed(query)?;
        if let Some(expected) = self
            .store
            .dimension()
            .filter(|expected| *expected != query_vector.len())
        {
            return Err(LoreError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }

        let results = self.store.search(&query_vector, self.config.top_k).await?;
        debug!("Retrieved {} chunks for query", results.len());

        Ok(Context {
            query: query.to_string(),
            chunks: results
                .into_iter()
                .enumerate()
                .map(|(i, result)| RetrievedChunk::from_result(i + 1, result))
                .collect(),
        })
    }

    /// Answer from the given context; an empty context short-circuits to
    /// [`INSUFFICIENT_CONTEXT_ANSWER`] without calling the model
    #[inline]
    pub fn generate(&self, context: Context) -> Result<Answer> {
        if context.is_empty() {
            info!("No context retrieved, returning insufficient-context answer");
            return Ok(Answer {
                text: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                context,
                insufficient_context: true,
            });
        }

        let prompt = build_prompt(&context);
        debug!(
            "Generating answer with {} from {} chunks",
            self.generator.model_name(),
            context.len()
        );
        let text = self.generator.generate(&prompt)?;

        Ok(Answer {
            text,
            context,
            insufficient_context: false,
        })
    }

    /// Retrieve, then generate
    #[inline]
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let context = self.retrieve(query).await?;
        self.generate(context)
    }
}
