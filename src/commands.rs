use anyhow::{Context, Result};
use console::style;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{Config, run_interactive_config, show_config};
use crate::corpus::Corpus;
use crate::database::{LanceStore, VectorStore};
use crate::evaluation::{
    check_coverage, evaluate_retriever, load_gold_prompts, write_results,
};
use crate::gatherer::gather_corpus;
use crate::indexer::Indexer;
use crate::ollama::OllamaClient;
use crate::pipeline::{Context as RetrievalContext, QueryPipeline, RetrievalConfig, SYSTEM_PROMPT};

/// Run interactive setup, or print the current configuration with `show`
#[inline]
pub fn configure(config_dir: &Path, show: bool) -> Result<()> {
    if show {
        let config = Config::load(config_dir)?;
        show_config(&config);
        return Ok(());
    }
    run_interactive_config(config_dir)
}

/// Fetch every configured page and write both corpus files
///
/// Nothing is written unless every page was gathered.
#[inline]
pub async fn gather(config: &Config) -> Result<()> {
    info!(
        "Gathering {} pages into {}",
        config.gatherer.pages.len(),
        config.data_dir_path().display()
    );

    let corpus = gather_corpus(&config.gatherer)
        .await
        .context("Gathering failed, no corpus files were written")?;

    let text_path = config.corpus_text_path();
    let json_path = config.corpus_json_path();
    corpus.write_all(&text_path, &json_path)?;

    eprintln!(
        "{} Gathered {} pages",
        style("✓").green(),
        style(corpus.len()).cyan()
    );
    eprintln!("  Text corpus: {}", style(text_path.display()).dim());
    eprintln!("  JSON corpus: {}", style(json_path.display()).dim());
    Ok(())
}

fn load_corpus(config: &Config, corpus_path: Option<&Path>) -> Result<Corpus> {
    let path = corpus_path.map_or_else(|| config.corpus_text_path(), Path::to_path_buf);
    if !path.exists() {
        anyhow::bail!(
            "Corpus file {} does not exist, run `lore-rag gather` first",
            path.display()
        );
    }
    Ok(Corpus::read(&path)?)
}

async fn open_store(config: &Config) -> Result<LanceStore> {
    let path = config.vector_database_path();
    LanceStore::open(&path)
        .await
        .with_context(|| format!("Failed to open vector store at {}", path.display()))
}

fn retrieval_config(config: &Config, top_k: Option<usize>) -> RetrievalConfig {
    RetrievalConfig {
        top_k: top_k.unwrap_or(config.retrieval.top_k).max(1),
    }
}

/// Chunk, embed and store the corpus
#[inline]
pub async fn index(config: &Config, corpus_path: Option<&Path>, rebuild: bool) -> Result<()> {
    let corpus = load_corpus(config, corpus_path)?;
    let client = OllamaClient::new(&config.ollama)?;
    client
        .validate_model()
        .context("Embedding model is not available")?;

    let mut store = open_store(config).await?;
    let stats = Indexer::new(&client, &mut store, config.chunking.clone())
        .with_batch_size(config.ollama.batch_size as usize)
        .index_corpus(&corpus, rebuild)
        .await?;

    eprintln!("{} Indexing complete", style("✓").green());
    eprintln!("  Snippets processed: {}", stats.snippets_processed);
    eprintln!("  Chunks created: {}", stats.chunks_created);
    eprintln!("  Embeddings generated: {}", stats.embeddings_generated);
    if stats.chunks_skipped > 0 {
        eprintln!("  Duplicate chunks skipped: {}", stats.chunks_skipped);
    }
    eprintln!("  Chunks in store: {}", store.count().await?);
    if let Some(dimension) = store
        .dimension()
        .filter(|d| *d != config.ollama.embedding_dimension as usize)
    {
        warn!(
            "Model {} produced {}-dimensional vectors but embedding_dimension is set to {}",
            config.ollama.model, dimension, config.ollama.embedding_dimension
        );
    }
    Ok(())
}

fn print_context(context: &RetrievalContext) {
    for chunk in &context.chunks {
        println!(
            "{} {} {}",
            style(format!("[{}]", chunk.rank)).bold(),
            style(&chunk.page_title).cyan(),
            style(format!("(score {:.3})", chunk.similarity_score)).dim()
        );
        println!("    {}", style(&chunk.page_url).dim());
        for line in chunk.content.lines().filter(|line| !line.trim().is_empty()) {
            println!("    {line}");
        }
        println!();
    }
}

/// Answer a question from the indexed corpus
#[inline]
pub async fn ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    show_context: bool,
) -> Result<()> {
    let client = OllamaClient::new(&config.ollama)?.with_system_prompt(SYSTEM_PROMPT);
    let store = open_store(config).await?;
    let pipeline = QueryPipeline::new(&client, &store, &client, retrieval_config(config, top_k));

    let answer = pipeline.answer(question).await?;

    if show_context {
        println!("{}", style("Context:").bold().yellow());
        print_context(&answer.context);
    }

    println!("{}", answer.text);

    if !answer.insufficient_context {
        println!();
        println!("{}", style("Sources:").bold().yellow());
        for chunk in answer.context.chunks.iter().unique_by(|c| &c.page_url) {
            println!(
                "  [{}] {} {}",
                chunk.rank,
                chunk.page_title,
                style(&chunk.page_url).dim()
            );
        }
    }
    Ok(())
}

/// Print the chunks retrieved for a query without generating an answer
#[inline]
pub async fn search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let client = OllamaClient::new(&config.ollama)?;
    let store = open_store(config).await?;
    let pipeline = QueryPipeline::new(&client, &store, &client, retrieval_config(config, top_k));

    let context = pipeline.retrieve(query).await?;
    if context.is_empty() {
        println!("No results found. Has the corpus been indexed?");
        return Ok(());
    }

    println!(
        "{} {} results for {}",
        style("🔍").bold(),
        context.len(),
        style(query).cyan()
    );
    println!();
    print_context(&context);
    Ok(())
}

/// Score retrieval against a gold prompt file and write the results
#[inline]
pub async fn evaluate(
    config: &Config,
    gold_path: &Path,
    top_k: Option<usize>,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let prompts = load_gold_prompts(gold_path)?;
    if prompts.is_empty() {
        warn!("Gold prompt file {} is empty", gold_path.display());
    }

    let client = OllamaClient::new(&config.ollama)?;
    let store = open_store(config).await?;
    let pipeline = QueryPipeline::new(&client, &store, &client, retrieval_config(config, top_k));

    let (rows, summary) = evaluate_retriever(&pipeline, &prompts).await?;
    let out_dir = out_dir.unwrap_or_else(|| config.evaluation_dir_path());
    let (results_path, summary_path) = write_results(&out_dir, &rows, &summary)?;

    println!("{}", style("Retriever evaluation").bold().cyan());
    for row in &rows {
        let mark = if row.passed() {
            style("✔").green()
        } else {
            style("✘").red()
        };
        println!(
            "{mark} {} {}",
            row.question,
            style(format!("(top-1: {})", row.top1_url)).dim()
        );
    }
    println!();
    println!("  Questions: {}", rows.len());
    println!("  Hit@{}: {:.3}", summary.k, summary.hit_at_k_url);
    println!("  MRR@{}: {:.3}", summary.k, summary.mrr_at_k_url);
    println!("  ContainsAll@{}: {:.3}", summary.k, summary.contains_all_at_k);
    println!();
    println!("Results: {}", style(results_path.display()).dim());
    println!("Summary: {}", style(summary_path.display()).dim());
    Ok(())
}

/// Report expected answer snippets missing from the gathered corpus
#[inline]
pub fn coverage(config: &Config, gold_path: &Path, corpus_path: Option<&Path>) -> Result<()> {
    let prompts = load_gold_prompts(gold_path)?;
    let corpus = load_corpus(config, corpus_path)?;
    let report = check_coverage(&prompts, &corpus);

    println!("{}", style("Corpus coverage").bold().cyan());
    println!("  Questions: {}", report.total_questions);
    println!("  Expected snippets: {}", report.total_snippets);
    println!("  Found: {}", style(report.found_snippets).green());
    println!("  Missing: {}", style(report.missing.len()).red());

    if report.missing.is_empty() {
        println!();
        println!("{} Every expected snippet occurs in the corpus", style("✓").green());
        return Ok(());
    }

    println!(
        "  Questions with missing snippets: {}",
        report.questions_with_missing()
    );
    for (source, items) in report.by_source() {
        println!();
        println!("{} ({} missing)", style(source).yellow(), items.len());
        for item in items {
            println!("  - {:?}", item.snippet);
            println!("    {}", style(&item.question).dim());
        }
    }
    Ok(())
}

/// Show the state of the corpus, vector store and Ollama server
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Lore RAG Status Report").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}", style("📚 Corpus:").bold().yellow());
    for path in [config.corpus_text_path(), config.corpus_json_path()] {
        if path.exists() {
            match Corpus::read(&path) {
                Ok(corpus) => println!("   ✅ {} ({} pages)", path.display(), corpus.len()),
                Err(e) => println!("   ⚠️  {} is unreadable - {}", path.display(), e),
            }
        } else {
            println!("   ❌ {} not found", path.display());
        }
    }
    println!();

    println!("{}", style("🔍 Vector Store:").bold().yellow());
    match open_store(config).await {
        Ok(store) => {
            println!("   ✅ LanceDB: {}", config.vector_database_path().display());
            match store.count().await {
                Ok(count) => println!("   📊 Chunks: {count}"),
                Err(e) => println!("   ⚠️  Chunks: unavailable - {e}"),
            }
            match store.dimension() {
                Some(dimension) if dimension != config.ollama.embedding_dimension as usize => {
                    println!(
                        "   ⚠️  Dimension: {dimension} (config expects {}, re-run `lore-rag index --rebuild`)",
                        config.ollama.embedding_dimension
                    );
                }
                Some(dimension) => println!("   🔢 Dimension: {dimension}"),
                None => println!("   💤 Empty, run `lore-rag index`"),
            }
            match store.embedding_models().await {
                Ok(models) if !models.is_empty() => {
                    let models: Vec<&str> = models.iter().map(String::as_str).collect();
                    println!("   🤖 Embedded with: {}", models.join(", "));
                }
                Ok(_) => {}
                Err(e) => println!("   ⚠️  Embedding models: unavailable - {e}"),
            }
        }
        Err(e) => {
            error!("Failed to open vector store: {e:#}");
            println!("   ❌ LanceDB: Failed to open - {e:#}");
        }
    }
    println!();

    println!("{}", style("🤖 Ollama:").bold().yellow());
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.ping() {
            Ok(()) => {
                println!("   ✅ Connected: {}", client.base_url());
                match client.health_check() {
                    Ok(()) => println!("   ✅ Models available"),
                    Err(e) => println!("   ⚠️  {e:#}"),
                }
                println!("   📋 Embedding model: {}", config.ollama.model);
                println!("   📋 Generation model: {}", config.ollama.generation_model);
            }
            Err(e) => println!("   ❌ Failed to connect - {e:#}"),
        },
        Err(e) => println!("   ❌ Invalid configuration - {e:#}"),
    }

    Ok(())
}
