use super::*;
use crate::corpus::CorpusSnippet;
use crate::database::MemoryStore;
use crate::embeddings::chunking::ChunkingConfig;
use crate::indexer::Indexer;
use crate::pipeline::{RetrievalConfig, RetrievedChunk};
use crate::test_support::{HashEmbedder, RecordingGenerator, lore_corpus};
use tempfile::TempDir;

fn prompt(question: &str, expected: &[&str], source_link: &str) -> GoldPrompt {
    GoldPrompt {
        question: question.to_string(),
        expected_answer_contains: expected.iter().map(|s| (*s).to_string()).collect(),
        source_link: source_link.to_string(),
        comment: "test".to_string(),
    }
}

fn chunk(rank: usize, url: &str, content: &str) -> RetrievedChunk {
    RetrievedChunk {
        rank,
        chunk_id: format!("chunk-{rank}"),
        snippet_id: format!("snippet-{rank}"),
        page_title: format!("Page {rank}"),
        page_url: url.to_string(),
        content: content.to_string(),
        similarity_score: 1.0 - rank as f32 * 0.1,
        distance: rank as f32 * 0.1,
    }
}

#[test]
fn normalize_url_drops_scheme_www_and_trailing_slash() {
    assert_eq!(
        normalize_url("https://www.Minecraft.wiki/w/Creeper/"),
        "minecraft.wiki/w/Creeper"
    );
    assert_eq!(
        normalize_url("http://minecraft.wiki/w/Creeper?action=view#Spawning"),
        "minecraft.wiki/w/Creeper"
    );
    assert_eq!(
        normalize_url("http://localhost:8080/w/Mob/"),
        "localhost:8080/w/Mob"
    );
    assert_eq!(normalize_url("www.Minecraft.wiki/w/Mob/"), "minecraft.wiki/w/mob");
    assert_eq!(normalize_url("   "), "");
}

#[test]
fn normalize_text_collapses_whitespace() {
    assert_eq!(normalize_text("  Blaze\n\tPOWDER   fuel "), "blaze powder fuel");
}

#[test]
fn normalize_for_search_handles_fraction_slash_and_zero_width() {
    assert_eq!(normalize_for_search("1 \u{2044} 2 Hearts"), "1/2 hearts");
    assert_eq!(normalize_for_search("3\u{2044}4"), "3/4");
    assert_eq!(normalize_for_search("Nether\u{200b}\u{200c}Wart"), "netherwart");
}

#[test]
fn score_prompt_finds_url_rank_and_snippets() {
    let context = Context {
        query: "q".to_string(),
        chunks: vec![
            chunk(1, "https://minecraft.wiki/w/Trading", "Villagers trade emeralds."),
            chunk(2, "https://minecraft.wiki/w/Brewing", "Blaze   powder fuels the\nbrewing stand."),
        ],
    };
    let gold = prompt(
        "What fuels a brewing stand?",
        &["blaze powder fuels", "Brewing Stand"],
        "https://www.minecraft.wiki/w/Brewing/",
    );

    let row = score_prompt(&gold, &context, 2);

    assert_eq!(row.hit_at_k_url, Some(1.0));
    assert_eq!(row.mrr_at_k_url, Some(0.5));
    assert_eq!(row.contains_all_at_k, 1.0);
    assert_eq!(row.top1_url, "minecraft.wiki/w/Trading");
    assert_eq!(row.topk_titles, vec!["Page 1", "Page 2"]);
    assert_eq!(row.k, 2);
}

#[test]
fn score_prompt_without_source_link_has_no_url_metrics() {
    let context = Context {
        query: "q".to_string(),
        chunks: vec![chunk(1, "https://minecraft.wiki/w/Mob", "Creepers explode.")],
    };
    let row = score_prompt(&prompt("Do creepers explode?", &[], ""), &context, 1);

    assert_eq!(row.hit_at_k_url, None);
    assert_eq!(row.mrr_at_k_url, None);
    // No expected snippets never counts as a pass
    assert_eq!(row.contains_all_at_k, 0.0);
}

#[test]
fn score_prompt_on_empty_context() {
    let context = Context {
        query: "q".to_string(),
        chunks: Vec::new(),
    };
    let row = score_prompt(
        &prompt("Anything?", &["creeper"], "https://minecraft.wiki/w/Mob"),
        &context,
        4,
    );

    assert_eq!(row.hit_at_k_url, Some(0.0));
    assert_eq!(row.mrr_at_k_url, Some(0.0));
    assert_eq!(row.contains_all_at_k, 0.0);
    assert!(row.top1_url.is_empty());
    assert_eq!(row.top1_score, None);
}

#[test]
fn row_passes_on_source_page_or_every_snippet() {
    let context = Context {
        query: "q".to_string(),
        chunks: vec![
            chunk(1, "https://minecraft.wiki/w/Brewing", "Blaze powder fuels the stand."),
            chunk(2, "https://minecraft.wiki/w/Mob", "Creepers explode."),
        ],
    };

    let by_url = score_prompt(
        &prompt("Creepers?", &["hiss"], "https://minecraft.wiki/w/Mob"),
        &context,
        2,
    );
    assert!(by_url.passed());

    let by_snippets = score_prompt(
        &prompt("Brewing fuel?", &["blaze powder"], "https://minecraft.wiki/w/Potion"),
        &context,
        2,
    );
    assert!(by_snippets.passed());

    let neither = score_prompt(
        &prompt("Trading?", &["emerald"], "https://minecraft.wiki/w/Trading"),
        &context,
        2,
    );
    assert!(!neither.passed());

    let no_link_no_snippets = score_prompt(&prompt("Anything?", &[], ""), &context, 2);
    assert!(!no_link_no_snippets.passed());
}

#[test]
fn summarize_uses_url_prompts_as_url_denominator() {
    let context = Context {
        query: "q".to_string(),
        chunks: vec![chunk(1, "https://minecraft.wiki/w/Mob", "creeper explosion")],
    };
    let rows = vec![
        score_prompt(
            &prompt("a", &["creeper"], "https://minecraft.wiki/w/Mob"),
            &context,
            1,
        ),
        score_prompt(
            &prompt("b", &["ghast"], "https://minecraft.wiki/w/Ghast"),
            &context,
            1,
        ),
        score_prompt(&prompt("c", &["explosion"], ""), &context, 1),
    ];

    let summary = summarize(&rows, 1);

    assert_eq!(summary.hit_at_k_url, 0.5);
    assert_eq!(summary.mrr_at_k_url, 0.5);
    assert!((summary.contains_all_at_k - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn summarize_empty_rows_is_zero() {
    let summary = summarize(&[], 5);
    assert_eq!(summary.k, 5);
    assert_eq!(summary.hit_at_k_url, 0.0);
    assert_eq!(summary.contains_all_at_k, 0.0);
}

#[tokio::test]
async fn evaluate_retriever_scores_indexed_corpus() {
    let embedder = HashEmbedder::new(256);
    let mut store = MemoryStore::new();
    Indexer::new(&embedder, &mut store, ChunkingConfig::default())
        .index_corpus(&lore_corpus(), false)
        .await
        .expect("indexing should succeed");
    let generator = RecordingGenerator::default();
    let pipeline = QueryPipeline::new(
        &embedder,
        &store,
        &generator,
        RetrievalConfig { top_k: 1 },
    );

    let prompts = vec![
        prompt(
            "What fuel does a brewing stand use?",
            &["blaze powder"],
            "https://minecraft.wiki/w/Brewing",
        ),
        prompt(
            "What do librarian villagers sell for emeralds?",
            &["enchanted books"],
            "https://minecraft.wiki/w/Trading",
        ),
    ];

    let (rows, summary) = evaluate_retriever(&pipeline, &prompts)
        .await
        .expect("evaluation should succeed");

    assert_eq!(rows.len(), 2);
    assert_eq!(summary.k, 1);
    assert_eq!(summary.hit_at_k_url, 1.0);
    assert_eq!(summary.mrr_at_k_url, 1.0);
    assert_eq!(summary.contains_all_at_k, 1.0);
    assert_eq!(generator.calls(), 0);
}

#[test]
fn load_gold_prompts_tolerates_missing_fields() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("gold.json");
    fs::write(
        &path,
        r#"[
            {"question": "What is a creeper?", "expected_answer_contains": ["hostile mob"],
             "source_link": "https://minecraft.wiki/w/Creeper", "comment": "basic"},
            {"question": "Where is the nether?"}
        ]"#,
    )
    .expect("should write gold file");

    let prompts = load_gold_prompts(&path).expect("gold prompts should load");

    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].missing_fields().is_empty());
    assert_eq!(
        prompts[1].missing_fields(),
        vec!["expected_answer_contains", "source_link", "comment"]
    );
}

#[test]
fn load_gold_prompts_rejects_non_array() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("gold.json");
    fs::write(&path, r#"{"question": "x"}"#).expect("should write gold file");

    let result = load_gold_prompts(&path);
    assert!(matches!(result, Err(LoreError::Config(_))));
}

#[test]
fn write_results_creates_both_files() {
    let dir = TempDir::new().expect("should create temp dir");
    let out = dir.path().join("evaluation");
    let rows = vec![score_prompt(
        &prompt("a", &["x"], "https://minecraft.wiki/w/A"),
        &Context {
            query: "a".to_string(),
            chunks: Vec::new(),
        },
        3,
    )];
    let summary = summarize(&rows, 3);

    let (results_path, summary_path) =
        write_results(&out, &rows, &summary).expect("results should be written");

    assert_eq!(results_path, out.join(RESULTS_FILE_NAME));
    let summary_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(&summary_path).expect("summary should be readable"),
    )
    .expect("summary should be JSON");
    assert_eq!(summary_json["k"], 3);
    assert_eq!(summary_json["hit_at_k_url"], 0.0);

    let results_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(&results_path).expect("results should be readable"),
    )
    .expect("results should be JSON");
    assert_eq!(results_json[0]["question"], "a");
    assert!(results_json[0]["top1_score"].is_null());
}

#[test]
fn check_coverage_reports_missing_snippets_by_source() {
    let corpus = Corpus::new(vec![
        CorpusSnippet::new(
            "Creeper",
            "https://minecraft.wiki/w/Creeper",
            "Creepers deal up to 22\u{200b} \u{2044} 2 damage.",
        ),
        CorpusSnippet::new(
            "Ghast",
            "https://minecraft.wiki/w/Ghast",
            "Ghasts shoot fireballs.",
        ),
    ]);
    let prompts = vec![
        prompt(
            "How much damage does a creeper deal?",
            &["22/2 damage", "charged creeper"],
            "https://minecraft.wiki/w/Creeper",
        ),
        prompt("What do ghasts shoot?", &["FIREBALLS"], ""),
        prompt("What do endermen carry?", &["blocks"], ""),
    ];

    let report = check_coverage(&prompts, &corpus);

    assert_eq!(report.total_questions, 3);
    assert_eq!(report.total_snippets, 4);
    assert_eq!(report.found_snippets, 2);
    assert_eq!(report.missing.len(), 2);
    assert_eq!(report.questions_with_missing(), 2);

    let grouped = report.by_source();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped["https://minecraft.wiki/w/Creeper"][0].snippet, "charged creeper");
    assert_eq!(grouped["N/A"][0].question, "What do endermen carry?");
}
