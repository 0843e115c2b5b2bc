
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::{LoreError, Result};

const BLOCK_RULE: &str = "========================================";
const PAGE_NAME_PREFIX: &str = "PAGE NAME: ";
const URL_PREFIX: &str = "URL: ";

/// One self-contained documentation topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSnippet {
    /// Stable slug derived from the title
    pub id: String,
    pub title: String,
    pub url: String,
    pub content: String,
}

impl CorpusSnippet {
    #[inline]
    pub fn new(title: &str, url: &str, content: &str) -> Self {
        Self {
            id: slugify(title),
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonSnippet {
    title: String,
    url: String,
    content: String,
}

/// Ordered collection of snippets produced by the gatherer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub snippets: Vec<CorpusSnippet>,
}

impl Corpus {
    #[inline]
    pub fn new(snippets: Vec<CorpusSnippet>) -> Self {
        Self { snippets }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<&CorpusSnippet> {
        self.snippets.iter().find(|s| s.id == id)
    }

    /// Render the human readable block format
    #[inline]
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for snippet in &self.snippets {
            text.push_str(BLOCK_RULE);
            text.push('\n');
            text.push_str(PAGE_NAME_PREFIX);
            text.push_str(&snippet.title.to_uppercase());
            text.push('\n');
            text.push_str(URL_PREFIX);
            text.push_str(&snippet.url);
            text.push('\n');
            text.push_str(BLOCK_RULE);
            text.push('\n');
            text.push_str(snippet.content.trim_end());
            text.push_str("\n\n");
        }
        text
    }

    /// Parse the block format written by [`Corpus::to_text`]
    #[inline]
    pub fn from_text(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let mut snippets = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].trim().is_empty() {
                i += 1;
                continue;
            }

            let header = lines.get(i..i + 4).ok_or_else(|| {
                LoreError::Corpus(format!("truncated page header at line {}", i + 1))
            })?;
            if header[0] != BLOCK_RULE || header[3] != BLOCK_RULE {
                return Err(LoreError::Corpus(format!(
                    "expected page separator at line {}",
                    i + 1
                )));
            }
            let title = header[1].strip_prefix(PAGE_NAME_PREFIX).ok_or_else(|| {
                LoreError::Corpus(format!("missing PAGE NAME at line {}", i + 2))
            })?;
            let url = header[2]
                .strip_prefix(URL_PREFIX)
                .ok_or_else(|| LoreError::Corpus(format!("missing URL at line {}", i + 3)))?;

            i += 4;
            let start = i;
            while i < lines.len() && !starts_block(&lines, i) {
                i += 1;
            }

            let content = lines[start..i].join("\n");
            snippets.push(CorpusSnippet::new(
                title.trim(),
                url.trim(),
                content.trim_end(),
            ));
        }

        debug!("Parsed {} snippets from corpus text", snippets.len());
        let corpus = Self { snippets };
        corpus.validate_ids()?;
        Ok(corpus)
    }

    #[inline]
    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<JsonSnippet> = self
            .snippets
            .iter()
            .map(|s| JsonSnippet {
                title: s.title.clone(),
                url: s.url.clone(),
                content: s.content.clone(),
            })
            .collect();
        serde_json::to_string_pretty(&entries)
            .map_err(|e| LoreError::Corpus(format!("failed to serialize corpus: {e}")))
    }

    #[inline]
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<JsonSnippet> = serde_json::from_str(json)
            .map_err(|e| LoreError::Corpus(format!("malformed corpus JSON: {e}")))?;
        let corpus = Self {
            snippets: entries
                .iter()
                .map(|e| CorpusSnippet::new(&e.title, &e.url, &e.content))
                .collect(),
        };
        corpus.validate_ids()?;
        Ok(corpus)
    }

    /// Every snippet needs a non-empty id that no other snippet shares
    #[inline]
    pub fn validate_ids(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.snippets.len());
        for (i, snippet) in self.snippets.iter().enumerate() {
            if snippet.id.is_empty() {
                return Err(LoreError::Corpus(format!(
                    "snippet {} ({:?}) has a title without letters or digits",
                    i + 1,
                    snippet.title
                )));
            }
            if !seen.insert(snippet.id.as_str()) {
                return Err(LoreError::Corpus(format!(
                    "snippet {} ({:?}) has the same id {:?} as an earlier snippet",
                    i + 1,
                    snippet.title,
                    snippet.id
                )));
            }
        }
        Ok(())
    }

    /// Read a corpus file, choosing the format from the extension
    #[inline]
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            LoreError::Corpus(format!("failed to read corpus {}: {e}", path.display()))
        })?;

        let corpus = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&raw)?
        } else {
            Self::from_text(&raw)?
        };

        info!(
            "Loaded {} snippets from {}",
            corpus.snippets.len(),
            path.display()
        );
        Ok(corpus)
    }

    /// Write both corpus formats, creating parent directories as needed
    #[inline]
    pub fn write_all(&self, text_path: &Path, json_path: &Path) -> Result<()> {
        let json = self.to_json()?;
        for path in [text_path, json_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(text_path, self.to_text())?;
        fs::write(json_path, json)?;

        info!(
            "Saved {} snippets to {} and {}",
            self.snippets.len(),
            text_path.display(),
            json_path.display()
        );
        Ok(())
    }
}

fn starts_block(lines: &[&str], i: usize) -> bool {
    lines[i] == BLOCK_RULE
        && lines
            .get(i + 1)
            .is_some_and(|next| next.starts_with(PAGE_NAME_PREFIX))
}

/// Lowercase slug: alphanumerics kept, every other run collapsed to one dash
#[inline]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
