#[cfg(test)]
mod tests;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

use crate::corpus::Corpus;
use crate::pipeline::{Context, QueryPipeline};
use crate::{LoreError, Result};

pub const RESULTS_FILE_NAME: &str = "retriever_eval_results.json";
pub const SUMMARY_FILE_NAME: &str = "retriever_eval_summary.json";

/// A question with the facts and page a good retrieval should surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldPrompt {
    pub question: String,
    pub expected_answer_contains: Vec<String>,
    pub source_link: String,
    pub comment: String,
}

impl GoldPrompt {
    /// Names of the fields that are missing or empty
    #[inline]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.expected_answer_contains.is_empty() {
            missing.push("expected_answer_contains");
        }
        if self.question.trim().is_empty() {
            missing.push("question");
        }
        if self.source_link.trim().is_empty() {
            missing.push("source_link");
        }
        if self.comment.trim().is_empty() {
            missing.push("comment");
        }
        missing
    }
}

/// Per-question retrieval metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRow {
    pub question: String,
    pub expected_answer_contains: Vec<String>,
    pub source_link: String,
    pub k: usize,
    /// `None` when the prompt has no source link
    pub hit_at_k_url: Option<f64>,
    pub mrr_at_k_url: Option<f64>,
    pub contains_all_at_k: f64,
    pub top1_url: String,
    pub top1_score: Option<f32>,
    pub topk_urls: Vec<String>,
    pub topk_titles: Vec<String>,
    pub comment: String,
}

impl EvaluationRow {
    /// Every expected snippet was retrieved, or the source page was
    #[inline]
    pub fn passed(&self) -> bool {
        self.contains_all_at_k == 1.0 || self.hit_at_k_url == Some(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub k: usize,
    /// Averaged over prompts with a source link
    pub hit_at_k_url: f64,
    /// Averaged over prompts with a source link
    pub mrr_at_k_url: f64,
    /// Averaged over every prompt
    pub contains_all_at_k: f64,
}

/// Load a gold prompt file, warning about incomplete entries
#[inline]
pub fn load_gold_prompts(path: &Path) -> Result<Vec<GoldPrompt>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        LoreError::Config(format!("failed to read gold prompts {}: {e}", path.display()))
    })?;
    let prompts: Vec<GoldPrompt> = serde_json::from_str(&raw).map_err(|e| {
        LoreError::Config(format!(
            "gold prompts {} must be a JSON array of prompt objects: {e}",
            path.display()
        ))
    })?;

    for (i, prompt) in prompts.iter().enumerate() {
        let missing = prompt.missing_fields();
        if !missing.is_empty() {
            warn!(
                "Gold prompt {} ({:?}) has missing or empty fields: {}",
                i + 1,
                prompt.question,
                missing.join(", ")
            );
        }
    }

    info!("Loaded {} gold prompts from {}", prompts.len(), path.display());
    Ok(prompts)
}

/// Host without `www.` followed by the path without trailing slash; scheme,
/// query and fragment are dropped
#[inline]
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    match Url::parse(url) {
        Ok(parsed) => {
            let mut host = parsed.host_str().unwrap_or_default().to_lowercase();
            if let Some(port) = parsed.port() {
                host = format!("{host}:{port}");
            }
            let host = host.strip_prefix("www.").unwrap_or(&host);
            format!("{host}{}", parsed.path().trim_end_matches('/'))
        }
        Err(_) => {
            let lowered = url.to_lowercase();
            let without_scheme = lowered
                .strip_prefix("https://")
                .or_else(|| lowered.strip_prefix("http://"))
                .unwrap_or(&lowered)
                .trim_end_matches('/');
            without_scheme
                .strip_prefix("www.")
                .unwrap_or(without_scheme)
                .to_string()
        }
    }
}

/// Lowercase with whitespace runs collapsed to single spaces
#[inline]
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase, zero-width characters dropped, fraction slashes replaced
#[inline]
pub fn normalize_for_search(text: &str) -> String {
    text.to_lowercase()
        .replace(['\u{200c}', '\u{200b}'], "")
        .replace(" \u{2044} ", "/")
        .replace('\u{2044}', "/")
}

/// Score one prompt against the context retrieved for it
#[inline]
pub fn score_prompt(prompt: &GoldPrompt, context: &Context, k: usize) -> EvaluationRow {
    let expected_url = normalize_url(&prompt.source_link);
    let expected_snippets: Vec<String> = prompt
        .expected_answer_contains
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| normalize_text(s))
        .collect();

    let hit_texts: Vec<String> = context
        .chunks
        .iter()
        .map(|c| normalize_text(&c.content))
        .collect();
    let hit_urls: Vec<String> = context
        .chunks
        .iter()
        .map(|c| normalize_url(&c.page_url))
        .collect();

    let (hit_at_k_url, mrr_at_k_url) = if expected_url.is_empty() {
        (None, None)
    } else {
        let rank = hit_urls
            .iter()
            .position(|u| !u.is_empty() && *u == expected_url)
            .map(|i| i + 1);
        (
            Some(if rank.is_some() { 1.0 } else { 0.0 }),
            Some(rank.map_or(0.0, |r| 1.0 / r as f64)),
        )
    };

    let contains_all = !expected_snippets.is_empty()
        && expected_snippets
            .iter()
            .all(|snippet| hit_texts.iter().any(|text| text.contains(snippet.as_str())));

    EvaluationRow {
        question: prompt.question.clone(),
        expected_answer_contains: prompt.expected_answer_contains.clone(),
        source_link: prompt.source_link.clone(),
        k,
        hit_at_k_url,
        mrr_at_k_url,
        contains_all_at_k: if contains_all { 1.0 } else { 0.0 },
        top1_url: hit_urls.first().cloned().unwrap_or_default(),
        top1_score: context.chunks.first().map(|c| c.similarity_score),
        topk_urls: hit_urls,
        topk_titles: context.chunks.iter().map(|c| c.page_title.clone()).collect(),
        comment: prompt.comment.clone(),
    }
}

/// Average the per-row metrics
#[inline]
pub fn summarize(rows: &[EvaluationRow], k: usize) -> EvaluationSummary {
    let with_url: Vec<&EvaluationRow> = rows.iter().filter(|r| r.hit_at_k_url.is_some()).collect();

    EvaluationSummary {
        k,
        hit_at_k_url: mean(with_url.iter().filter_map(|r| r.hit_at_k_url), with_url.len()),
        mrr_at_k_url: mean(with_url.iter().filter_map(|r| r.mrr_at_k_url), with_url.len()),
        contains_all_at_k: mean(rows.iter().map(|r| r.contains_all_at_k), rows.len()),
    }
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        values.sum::<f64>() / count as f64
    }
}

/// Run retrieval for every prompt and score it, without calling the model
#[inline]
pub async fn evaluate_retriever(
    pipeline: &QueryPipeline<'_>,
    prompts: &[GoldPrompt],
) -> Result<(Vec<EvaluationRow>, EvaluationSummary)> {
    let k = pipeline.top_k();
    let mut rows = Vec::with_capacity(prompts.len());

    for (i, prompt) in prompts.iter().enumerate() {
        let context = pipeline.retrieve(&prompt.question).await?;
        for chunk in &context.chunks {
            debug!(
                "Hit {}: URL={}, Score={}",
                chunk.rank, chunk.page_url, chunk.similarity_score
            );
        }

        let row = score_prompt(prompt, &context, k);
        debug!(
            "[{}/{}] {} {}",
            i + 1,
            prompts.len(),
            if row.passed() { "pass" } else { "miss" },
            prompt.question
        );
        rows.push(row);
    }

    let summary = summarize(&rows, k);
    Ok((rows, summary))
}

/// Write per-row results and the summary as pretty JSON into `out_dir`
#[inline]
pub fn write_results(
    out_dir: &Path,
    rows: &[EvaluationRow],
    summary: &EvaluationSummary,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(out_dir)?;
    let results_path = out_dir.join(RESULTS_FILE_NAME);
    let summary_path = out_dir.join(SUMMARY_FILE_NAME);

    fs::write(&results_path, to_pretty_json(&rows)?)?;
    fs::write(&summary_path, to_pretty_json(summary)?)?;

    info!("Wrote evaluation results to {}", out_dir.display());
    Ok((results_path, summary_path))
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| LoreError::Other(anyhow::Error::new(e).context("failed to serialize evaluation output")))
}

/// An expected snippet that does not occur anywhere in the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSnippet {
    pub question: String,
    pub snippet: String,
    pub source_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub total_questions: usize,
    pub total_snippets: usize,
    pub found_snippets: usize,
    pub missing: Vec<MissingSnippet>,
}

impl CoverageReport {
    #[inline]
    pub fn questions_with_missing(&self) -> usize {
        self.missing.iter().map(|m| m.question.as_str()).unique().count()
    }

    /// Missing snippets grouped by the page they were expected on
    #[inline]
    pub fn by_source(&self) -> BTreeMap<&str, Vec<&MissingSnippet>> {
        let mut grouped: BTreeMap<&str, Vec<&MissingSnippet>> = BTreeMap::new();
        for item in &self.missing {
            grouped.entry(item.source_link.as_str()).or_default().push(item);
        }
        grouped
    }
}

/// Check which expected snippets never occur in the gathered corpus
#[inline]
pub fn check_coverage(prompts: &[GoldPrompt], corpus: &Corpus) -> CoverageReport {
    let all_content = normalize_for_search(
        &corpus
            .snippets
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    );

    let mut report = CoverageReport {
        total_questions: prompts.len(),
        ..CoverageReport::default()
    };

    for prompt in prompts {
        let source_link = if prompt.source_link.trim().is_empty() {
            "N/A".to_string()
        } else {
            prompt.source_link.clone()
        };

        for snippet in &prompt.expected_answer_contains {
            report.total_snippets += 1;
            if all_content.contains(&normalize_for_search(snippet)) {
                report.found_snippets += 1;
            } else {
                report.missing.push(MissingSnippet {
                    question: prompt.question.clone(),
                    snippet: snippet.clone(),
                    source_link: source_link.clone(),
                });
            }
        }
    }

    report
}
