//! Document-retrieval answer path.
//!
//! Runs a similarity search over the vector index, stitches the matching
//! chunks into a context block, and asks the generator to answer strictly
//! from that context.

use anyhow::Result;

use crate::embedding::Embedder;
use crate::llm::{CompletionOptions, LlmClient};
use crate::vector_index::VectorIndex;

/// Fixed answer when no vector index is loaded yet.
pub const KNOWLEDGE_BASE_NOT_READY: &str =
    "Maaf, database pengetahuan dokumen sedang tidak siap.";

/// Answer `question` from the `top_k` most relevant indexed chunks.
///
/// The prompt instructs the model to decline when the retrieved context
/// does not cover the question, rather than invent an answer.
pub async fn answer_from_documents(
    llm: &LlmClient,
    embedder: &dyn Embedder,
    index: &VectorIndex,
    question: &str,
    top_k: usize,
) -> Result<String> {
    let hits = index.similarity_search(embedder, question, top_k).await?;
    let context = hits
        .iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let cfg = llm.config();
    let prompt = format!(
        "{persona} Answer the user's question: \"{question}\" based ONLY on the \
         following context:\n\n{context}\n\nIf the context is not relevant, say you \
         don't have the information. Answer in {language}.",
        persona = cfg.persona,
        question = question,
        context = context,
        language = cfg.language,
    );

    llm.complete(
        &prompt,
        &CompletionOptions {
            temperature: cfg.answer_temperature,
            ..Default::default()
        },
    )
    .await
}
