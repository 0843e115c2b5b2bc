// Shared fixtures for the integration tests
#![allow(dead_code, reason = "each test binary uses a different subset")]

use lore_rag::Result;
use lore_rag::corpus::{Corpus, CorpusSnippet};
use lore_rag::embeddings::Embedder;
use lore_rag::generation::Generator;
use std::sync::Mutex;

/// Deterministic bag-of-words embedder
pub struct KeywordEmbedder {
    pub model: String,
    pub dimension: usize,
}

impl KeywordEmbedder {
    pub fn new(model: &str, dimension: usize) -> Self {
        Self {
            model: model.to_string(),
            dimension,
        }
    }
}

pub fn keyword_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimension];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let hash = word.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
        vector[(hash % dimension as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(keyword_vector(text, self.dimension))
    }
}

/// Generator that records prompts and replies with a fixed answer
#[derive(Default)]
pub struct CannedGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl CannedGenerator {
    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("lock should not be poisoned").len()
    }
}

impl Generator for CannedGenerator {
    fn model_name(&self) -> &str {
        "canned"
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(prompt.to_string());
        Ok("Creepers explode when they get close to a player.".to_string())
    }
}

pub fn sample_corpus() -> Corpus {
    Corpus::new(vec![
        CorpusSnippet::new(
            "mobs",
            "https://minecraft.wiki/w/Mob",
            "H2: Hostile mobs\nA creeper is a hostile mob that silently approaches players \
             and explodes. The creeper explosion destroys blocks and damages nearby players.\n\n\
             H2: Passive mobs\nCows, pigs and sheep are passive mobs found in grassy biomes.",
        ),
        CorpusSnippet::new(
            "brewing",
            "https://minecraft.wiki/w/Brewing",
            "H2: Brewing stand\nBrewing is the process of making potions in a brewing stand. \
             Blaze powder fuels the brewing stand and nether wart creates awkward potions.",
        ),
        CorpusSnippet::new(
            "enchanting",
            "https://minecraft.wiki/w/Enchanting",
            "H2: Enchanting table\nEnchanting uses lapis lazuli and experience levels at an \
             enchanting table. Bookshelves around the table unlock stronger enchantments.",
        ),
    ])
}
