use std::fmt::Write;

use super::Context;

/// System prompt sent alongside every generation request
pub const SYSTEM_PROMPT: &str = "You are a Minecraft lore assistant. Answer strictly from the \
numbered context passages you are given. If they do not contain the answer, say that you do \
not know instead of guessing.";

const INSTRUCTIONS: &str = "Use only the context below to answer the question. \
Cite the passages you rely on by their number, for example [1].";

/// Assemble instructions, numbered context blocks and the question
#[inline]
pub fn build_prompt(context: &Context) -> String {
    let mut prompt = String::new();
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");

    for chunk in &context.chunks {
        // Writing into a String cannot fail
        let _ = write!(
            prompt,
            "\n[{}] {} ({})\n{}\n",
            chunk.rank,
            chunk.page_title,
            chunk.page_url,
            chunk.content.trim()
        );
    }

    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", context.query.trim());
    prompt
}
