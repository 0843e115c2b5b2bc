
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::corpus::{Corpus, CorpusSnippet};

/// A bounded piece of one corpus snippet, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// SHA-256 of the owning snippet id and the chunk text
    pub id: String,
    /// Id of the snippet this chunk was cut from
    pub snippet_id: String,
    pub content: String,
    /// Position of this chunk within its snippet
    pub chunk_index: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens
    pub target_chunk_size: usize,
    /// Hard upper bound in tokens
    pub max_chunk_size: usize,
    /// Minimum chunk size in tokens (smaller trailing chunks are merged)
    pub min_chunk_size: usize,
    /// Overlap size in tokens between adjacent chunks
    pub overlap_size: usize,
    /// Chunks with this many trimmed characters or fewer are dropped as noise
    pub min_chunk_chars: usize,
    /// Whether to break at sentence boundaries before falling back to words
    pub sentence_boundary_splitting: bool,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            target_chunk_size: 250,
            max_chunk_size: 300,
            min_chunk_size: 100,
            overlap_size: 20,
            min_chunk_chars: 20,
            sentence_boundary_splitting: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joint {
    Paragraph,
    Line,
    Inline,
}

impl Joint {
    const fn separator(self) -> &'static str {
        match self {
            Self::Paragraph => "\n\n",
            Self::Line => "\n",
            Self::Inline => " ",
        }
    }
}

/// Smallest indivisible piece of text the chunker accumulates
#[derive(Debug, Clone)]
struct Unit {
    text: String,
    joint: Joint,
}

/// Chunk every snippet of a corpus, preserving corpus order
#[inline]
pub fn chunk_corpus(corpus: &Corpus, config: &ChunkingConfig) -> Vec<ContentChunk> {
    corpus
        .snippets
        .iter()
        .flat_map(|snippet| chunk_snippet(snippet, config))
        .collect()
}

/// Chunk a single snippet into embedding-ready pieces
#[inline]
pub fn chunk_snippet(snippet: &CorpusSnippet, config: &ChunkingConfig) -> Vec<ContentChunk> {
    let units = split_into_units(&snippet.content, config);
    if units.is_empty() {
        return Vec::new();
    }

    let groups = rebalance_tail(group_units(units, config), config);
    let texts = add_overlap(groups, config);

    let chunks: Vec<ContentChunk> = texts
        .into_iter()
        .filter(|text| text.trim().chars().count() > config.min_chunk_chars)
        .enumerate()
        .map(|(chunk_index, content)| ContentChunk {
            id: chunk_id(&snippet.id, &content),
            snippet_id: snippet.id.clone(),
            token_count: estimate_token_count(&content),
            content,
            chunk_index,
        })
        .collect();

    debug!(
        "Chunked snippet '{}' into {} chunks (avg {} tokens)",
        snippet.title,
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Content-hash id for a chunk of the given snippet
#[inline]
pub fn chunk_id(snippet_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snippet_id.as_bytes());
    hasher.update([0]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Largest token estimate a single unit may carry
fn unit_cap(config: &ChunkingConfig) -> usize {
    (config.min_chunk_size / 2).max(1)
}

/// Break text into paragraphs, lines, sentences, words and finally characters
/// until every unit fits under the unit cap
fn split_into_units(content: &str, config: &ChunkingConfig) -> Vec<Unit> {
    let cap = unit_cap(config);
    let mut units = Vec::new();

    for paragraph in content.split("\n\n") {
        let mut joint = Joint::Paragraph;
        for line in paragraph.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let pieces: Vec<&str> = if config.sentence_boundary_splitting {
                line.split_inclusive(['.', '!', '?'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            } else {
                vec![line]
            };

            for piece in pieces {
                for text in split_oversized(piece, cap) {
                    units.push(Unit { text, joint });
                    joint = Joint::Inline;
                }
            }
            joint = Joint::Line;
        }
    }

    units
}

/// Split a piece by words when its estimate exceeds the cap
fn split_oversized(piece: &str, cap: usize) -> Vec<String> {
    if estimate_token_count(piece) <= cap {
        return vec![piece.to_string()];
    }

    let mut windows = Vec::new();
    let mut current = String::new();

    for word in piece.split_whitespace() {
        for part in split_word(word, cap) {
            let candidate = if current.is_empty() {
                part.clone()
            } else {
                format!("{current} {part}")
            };

            if estimate_token_count(&candidate) > cap && !current.is_empty() {
                windows.push(std::mem::take(&mut current));
                current = part;
            } else {
                current = candidate;
            }
        }
    }

    if !current.is_empty() {
        windows.push(current);
    }

    windows
}

/// Split a single giant word into fixed-width character windows
fn split_word(word: &str, cap: usize) -> Vec<String> {
    if estimate_token_count(word) <= cap {
        return vec![word.to_string()];
    }

    let width = cap.saturating_mul(8).max(1);
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(width)
        .map(|window| window.iter().collect())
        .collect()
}

fn join_units(units: &[Unit]) -> String {
    let mut text = String::new();
    for (i, unit) in units.iter().enumerate() {
        if i > 0 {
            text.push_str(unit.joint.separator());
        }
        text.push_str(&unit.text);
    }
    text
}

/// Greedily accumulate units until the next one would pass the target size
fn group_units(units: Vec<Unit>, config: &ChunkingConfig) -> Vec<Vec<Unit>> {
    let mut groups = Vec::new();
    let mut current: Vec<Unit> = Vec::new();

    for unit in units {
        if !current.is_empty() {
            current.push(unit);
            if estimate_token_count(&join_units(&current)) > config.target_chunk_size {
                let next = current.pop().into_iter().collect();
                groups.push(std::mem::replace(&mut current, next));
            }
        } else {
            current.push(unit);
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    groups
}

/// Merge or refill a short trailing group so it respects the minimum size
fn rebalance_tail(mut groups: Vec<Vec<Unit>>, config: &ChunkingConfig) -> Vec<Vec<Unit>> {
    if groups.len() < 2 {
        return groups;
    }

    let last_tokens = groups
        .last()
        .map_or(0, |last| estimate_token_count(&join_units(last)));
    if last_tokens >= config.min_chunk_size {
        return groups;
    }

    let last_index = groups.len() - 1;
    let (head, tail) = groups.split_at_mut(last_index);
    let previous = &mut head[head.len() - 1];
    let last = &mut tail[0];

    let merged: Vec<Unit> = previous.iter().chain(last.iter()).cloned().collect();
    if estimate_token_count(&join_units(&merged)) <= config.max_chunk_size {
        *previous = merged;
        groups.pop();
        return groups;
    }

    while estimate_token_count(&join_units(last)) < config.min_chunk_size && previous.len() > 1 {
        let remaining = &previous[..previous.len() - 1];
        if estimate_token_count(&join_units(remaining)) < config.min_chunk_size {
            break;
        }
        if let Some(unit) = previous.pop() {
            last.insert(0, unit);
        }
    }

    groups
}

/// Prefix each chunk with the tail of the previous one when it still fits
fn add_overlap(groups: Vec<Vec<Unit>>, config: &ChunkingConfig) -> Vec<String> {
    let texts: Vec<String> = groups.iter().map(|group| join_units(group)).collect();
    if config.overlap_size == 0 {
        return texts;
    }

    let mut result = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
        let overlapped = i
            .checked_sub(1)
            .map(|prev| extract_overlap_text(&texts[prev], config.overlap_size))
            .filter(|overlap| !overlap.is_empty())
            .map(|overlap| format!("{overlap} {text}"))
            .filter(|candidate| estimate_token_count(candidate) <= config.max_chunk_size);

        result.push(overlapped.unwrap_or_else(|| text.clone()));
    }

    result
}

/// Extract overlap text from the end of a chunk
fn extract_overlap_text(content: &str, overlap_tokens: usize) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    let word_count = (overlap_tokens as f64 * 0.75) as usize; // Rough word-to-token ratio

    if word_count == 0 || words.len() <= word_count {
        return String::new();
    }

    words[words.len() - word_count..].join(" ")
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
