#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

mod common;

use common::{CannedGenerator, KeywordEmbedder, sample_corpus};
use lore_rag::LoreError;
use lore_rag::corpus::Corpus;
use lore_rag::database::{LanceStore, VectorStore};
use lore_rag::embeddings::chunking::ChunkingConfig;
use lore_rag::indexer::Indexer;
use lore_rag::pipeline::{INSUFFICIENT_CONTEXT_ANSWER, QueryPipeline, RetrievalConfig};
use tempfile::TempDir;

const DIMENSION: usize = 128;

async fn index_into(store: &mut LanceStore, embedder: &KeywordEmbedder, corpus: &Corpus) {
    Indexer::new(embedder, store, ChunkingConfig::default())
        .index_corpus(corpus, false)
        .await
        .expect("indexing should succeed");
}

#[tokio::test]
async fn corpus_file_to_answer_end_to_end() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let text_path = temp_dir.path().join("data").join("lore_docs.txt");
    let json_path = temp_dir.path().join("data").join("lore.json");
    sample_corpus()
        .write_all(&text_path, &json_path)
        .expect("corpus should be written");

    let corpus = Corpus::read(&text_path).expect("corpus should be read back");
    assert_eq!(corpus.len(), 3);

    let embedder = KeywordEmbedder::new("keyword", DIMENSION);
    let db_path = temp_dir.path().join("vectors");
    let mut store = LanceStore::open(&db_path).await.expect("store should open");
    index_into(&mut store, &embedder, &corpus).await;

    // Reopen to read what was persisted
    let store = LanceStore::open(&db_path).await.expect("store should reopen");
    assert!(store.count().await.expect("count should succeed") >= 3);
    assert_eq!(store.dimension(), Some(DIMENSION));

    let generator = CannedGenerator::default();
    let pipeline = QueryPipeline::new(
        &embedder,
        &store,
        &generator,
        RetrievalConfig { top_k: 2 },
    );
    let answer = pipeline
        .answer("What happens when a creeper explodes?")
        .await
        .expect("answer should succeed");

    assert_eq!(answer.context.len(), 2);
    assert_eq!(answer.context.chunks[0].snippet_id, "mobs");
    assert_eq!(answer.context.chunks[0].page_url, "https://minecraft.wiki/w/Mob");
    assert!(answer.context.chunks[0].content.contains("creeper"));
    assert!(!answer.insufficient_context);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn reindexing_same_corpus_is_idempotent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = KeywordEmbedder::new("keyword", DIMENSION);
    let mut store = LanceStore::open(temp_dir.path())
        .await
        .expect("store should open");

    index_into(&mut store, &embedder, &sample_corpus()).await;
    let first = store.count().await.expect("count should succeed");
    index_into(&mut store, &embedder, &sample_corpus()).await;
    let second = store.count().await.expect("count should succeed");

    assert_eq!(first, second);
}

#[tokio::test]
async fn different_model_requires_rebuild() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = LanceStore::open(temp_dir.path())
        .await
        .expect("store should open");
    index_into(
        &mut store,
        &KeywordEmbedder::new("keyword", DIMENSION),
        &sample_corpus(),
    )
    .await;

    let other = KeywordEmbedder::new("other-model", 64);
    let refused = Indexer::new(&other, &mut store, ChunkingConfig::default())
        .index_corpus(&sample_corpus(), false)
        .await;
    assert!(matches!(refused, Err(LoreError::EmbeddingMismatch(_))));

    let stats = Indexer::new(&other, &mut store, ChunkingConfig::default())
        .index_corpus(&sample_corpus(), true)
        .await
        .expect("rebuild should succeed");
    assert_eq!(stats.snippets_processed, 3);
    assert_eq!(store.dimension(), Some(64));
    assert_eq!(
        store
            .embedding_models()
            .await
            .expect("models should be listed")
            .into_iter()
            .collect::<Vec<_>>(),
        vec!["other-model".to_string()]
    );
}

#[tokio::test]
async fn query_with_wrong_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = KeywordEmbedder::new("keyword", DIMENSION);
    let mut store = LanceStore::open(temp_dir.path())
        .await
        .expect("store should open");
    index_into(&mut store, &embedder, &sample_corpus()).await;

    let narrow = KeywordEmbedder::new("keyword", 32);
    let generator = CannedGenerator::default();
    let pipeline = QueryPipeline::new(&narrow, &store, &generator, RetrievalConfig::default());

    let result = pipeline.retrieve("creeper").await;
    assert!(matches!(
        result,
        Err(LoreError::DimensionMismatch {
            expected: DIMENSION,
            actual: 32
        })
    ));
}

#[tokio::test]
async fn empty_store_answers_without_model() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = LanceStore::open(temp_dir.path())
        .await
        .expect("store should open");
    let embedder = KeywordEmbedder::new("keyword", DIMENSION);
    let generator = CannedGenerator::default();
    let pipeline = QueryPipeline::new(&embedder, &store, &generator, RetrievalConfig::default());

    let answer = pipeline
        .answer("Where do creepers spawn?")
        .await
        .expect("answer should succeed");

    assert!(answer.insufficient_context);
    assert_eq!(answer.text, INSUFFICIENT_CONTEXT_ANSWER);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn unrelated_query_still_returns_top_k() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let embedder = KeywordEmbedder::new("keyword", DIMENSION);
    let mut store = LanceStore::open(temp_dir.path())
        .await
        .expect("store should open");
    index_into(&mut store, &embedder, &sample_corpus()).await;

    let generator = CannedGenerator::default();
    let pipeline = QueryPipeline::new(
        &embedder,
        &store,
        &generator,
        RetrievalConfig { top_k: 2 },
    );
    let context = pipeline
        .retrieve("quantum chromodynamics lattice")
        .await
        .expect("retrieval should succeed");

    assert_eq!(context.len(), 2);
    assert_eq!(context.chunks[0].rank, 1);
    assert_eq!(context.chunks[1].rank, 2);
}
