//! Keyword-intent matcher.
//!
//! A deterministic short-circuit in front of the AI pipeline: questions
//! containing a configured keyword get a canned response immediately, with
//! no classifier call and no cache involvement.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One canned response and the keywords that trigger it.
#[derive(Debug, Clone, Deserialize)]
pub struct Intent {
    pub keywords: Vec<String>,
    pub response: String,
}

/// Load intent definitions from a JSON array file. A missing file is not an
/// error — the matcher just never fires.
pub fn load_intents(path: &Path) -> Result<Vec<Intent>> {
    if !path.is_file() {
        eprintln!(
            "Warning: no intent file at {}, keyword intents disabled",
            path.display()
        );
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read intent file: {}", path.display()))?;
    let intents: Vec<Intent> =
        serde_json::from_str(&content).context("Failed to parse intent file")?;
    Ok(intents)
}

/// Case-insensitive keyword scan. First matching intent wins.
pub fn detect_intent<'a>(intents: &'a [Intent], text: &str) -> Option<&'a str> {
    let q = text.to_lowercase();
    intents
        .iter()
        .find(|intent| {
            intent
                .keywords
                .iter()
                .any(|k| !k.is_empty() && q.contains(&k.to_lowercase()))
        })
        .map(|intent| intent.response.as_str())
}
