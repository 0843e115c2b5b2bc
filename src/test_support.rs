//! Deterministic stand-ins for the model-backed traits.

use std::sync::Mutex;

use crate::Result;
use crate::corpus::{Corpus, CorpusSnippet};
use crate::embeddings::Embedder;
use crate::generation::Generator;

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// `dimension` buckets and the vector is L2-normalised
pub struct HashEmbedder {
    pub model: String,
    pub dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "hash-embedder".to_string(),
            dimension,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[(fnv1a(word) % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}

/// Generator that records every prompt and answers with a fixed reply
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("lock should not be poisoned").len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .last()
            .cloned()
    }
}

impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording-generator"
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(prompt.to_string());
        Ok("Generated answer".to_string())
    }
}

pub fn lore_corpus() -> Corpus {
    Corpus::new(vec![
        CorpusSnippet::new(
            "mobs",
            "https://minecraft.wiki/w/Mob",
            "A creeper is a hostile mob that sneaks up on players and explodes. \
             Creepers hiss before the creeper explosion destroys nearby blocks.",
        ),
        CorpusSnippet::new(
            "brewing",
            "https://minecraft.wiki/w/Brewing",
            "Brewing makes potions in a brewing stand using blaze powder as fuel. \
             Nether wart turns water bottles into awkward potions.",
        ),
        CorpusSnippet::new(
            "trading",
            "https://minecraft.wiki/w/Trading",
            "Trading lets players exchange emeralds with villagers for items. \
             Librarian villagers sell enchanted books for emeralds.",
        ),
    ])
}
