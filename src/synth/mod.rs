//! Answer synthesis
//!
//! The language model sits behind [`Synthesizer`]; the pipeline only
//! promises to hand it the context in ranked order.

mod openai;

pub use openai::OpenAiSynthesizer;

use async_trait::async_trait;

use crate::error::SynthesisError;
use crate::file::FileRecord;

/// Instruction sent ahead of the file context
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about source code. \
Answer using the files provided. Files are ordered from most to least relevant.";

/// Turns file context plus a question into an answer
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// `context` is best match first and must be used in that order
    async fn synthesize(
        &self,
        context: &[FileRecord],
        question: &str,
    ) -> Result<String, SynthesisError>;
}

/// Render the user message: every file in order, then the question
pub fn build_prompt(context: &[FileRecord], question: &str) -> String {
    let size = context
        .iter()
        .map(|f| f.path.len() + f.contents.len() + 8)
        .sum::<usize>()
        + question.len()
        + 8;

    let mut prompt = String::with_capacity(size);
    for file in context {
        prompt.push_str("----\n");
        prompt.push_str(&file.path);
        prompt.push('\n');
        prompt.push_str(&file.contents);
        prompt.push('\n');
    }
    prompt.push_str("----\n");
    prompt.push_str(question);
    prompt
}
