//! Structured data query engine.
//!
//! Answers statistics questions in four steps: ask the planner model for a
//! filter condition over the known headers, compile that text through the
//! whitelisted predicate grammar, scan the in-memory table, then have the
//! generator phrase the result. An empty result set falls back to document
//! retrieval when a vector index is loaded — absence of a structured match
//! does not mean no answer exists.

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::embedding::Embedder;
use crate::llm::{CompletionOptions, LlmClient};
use crate::predicate::{self, Expr};
use crate::retrieval;
use crate::stats::StatisticsTable;
use crate::vector_index::VectorIndex;

/// Outcome of one table scan.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub count: usize,
    /// Identifying names, filled when the match set is small (≤ 5).
    pub sample_names: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

/// Answer a statistics question end to end.
pub async fn run_data_query(
    llm: &LlmClient,
    embedder: &dyn Embedder,
    table: &StatisticsTable,
    index: Option<&VectorIndex>,
    question: &str,
    top_k: usize,
) -> Result<String> {
    let raw = plan_predicate(llm, question, &table.headers).await?;
    let cleaned = strip_code_fences(&raw);
    let expr = predicate::compile(&cleaned)
        .with_context(|| format!("Planner produced an invalid filter: {}", cleaned))?;

    let result = filter_rows(table, &expr);

    if result.count == 0 {
        if let Some(index) = index {
            eprintln!(
                "No statistics rows matched; falling back to document retrieval for: {}",
                question
            );
            return retrieval::answer_from_documents(llm, embedder, index, question, top_k).await;
        }
    }

    let analysis = summarize(&result);
    let cfg = llm.config();
    let prompt = format!(
        "{persona} The user asked: \"{question}\". The analysis result is: \
         \"{analysis}\". Formulate a friendly answer in {language}. \
         Do not mention the analysis step.",
        persona = cfg.persona,
        question = question,
        analysis = analysis,
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

/// Ask the planner model for a filter condition in the predicate grammar.
async fn plan_predicate(llm: &LlmClient, question: &str, headers: &[String]) -> Result<String> {
    let prompt = format!(
        r#"You are helping to analyze village statistics data.

Based on the question: "{question}"
and the table headers: [{headers}]

Write ONE filter condition in this exact mini-language:

  "Column Name" contains "value"
  "Column Name" equals "value"

Conditions may be combined with and / or / not and parentheses.

Rules:
- Use only headers from the list, always in double quotes.
- Put values in double quotes, lowercase.
- Return the raw condition only. No explanation, no code, no backticks.

Examples:
- "jumlah laki laki" => "Jenis Kelamin" contains "laki-laki"
- "penduduk perempuan" => "Jenis Kelamin" contains "perempuan"
- "warga beragama islam" => "Agama" contains "islam"
"#,
        question = question,
        headers = headers.join(", "),
    );

    llm.complete(
        &prompt,
        &CompletionOptions {
            temperature: 0.0,
            ..Default::default()
        },
    )
    .await
}

/// Apply a compiled predicate to every row. A row the predicate cannot
/// evaluate is a non-match; the scan itself never aborts.
pub fn filter_rows(table: &StatisticsTable, expr: &Expr) -> QueryResult {
    let rows: Vec<HashMap<String, String>> = table
        .rows
        .iter()
        .filter(|row| expr.matches(row))
        .cloned()
        .collect();

    let count = rows.len();
    let sample_names = if (1..=5).contains(&count) {
        rows.iter()
            .filter_map(|row| {
                row.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("nama"))
                    .map(|(_, v)| v.clone())
            })
            .filter(|name| !name.is_empty())
            .collect()
    } else {
        Vec::new()
    };

    QueryResult {
        count,
        sample_names,
        rows,
    }
}

/// Short analysis line handed to the answer formatter.
pub fn summarize(result: &QueryResult) -> String {
    let mut analysis = format!("Ditemukan {} data yang cocok.", result.count);
    if !result.sample_names.is_empty() {
        analysis.push_str(&format!(" Nama: {}.", result.sample_names.join(", ")));
    }
    analysis
}

/// Drop markdown code fences and stray language labels the planner
/// sometimes wraps its output in.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```") {
        // Drop the fence line (possibly carrying a language tag).
        text = match stripped.find('\n') {
            Some(nl) => &stripped[nl + 1..],
            None => stripped,
        };
        if let Some(stripped) = text.strip_suffix("```") {
            text = stripped;
        }
    }
    text.replace('`', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::compile;

    fn table() -> StatisticsTable {
        let headers = vec![
            "Nama".to_string(),
            "Jenis Kelamin".to_string(),
            "Agama".to_string(),
        ];
        let rows = [
            ("Budi", "Laki - Laki", "Islam"),
            ("Agus", "Laki - Laki", "Islam"),
            ("Joko", "Laki - Laki", "Hindu"),
            ("Sari", "Perempuan", "Islam"),
            ("Dewi", "Perempuan", "Hindu"),
        ]
        .iter()
        .map(|(nama, jk, agama)| {
            let mut row = std::collections::HashMap::new();
            row.insert("Nama".to_string(), nama.to_string());
            row.insert("Jenis Kelamin".to_string(), jk.to_string());
            row.insert("Agama".to_string(), agama.to_string());
            row
        })
        .collect();
        StatisticsTable { headers, rows }
    }

    #[test]
    fn male_rows_match_despite_spacing_differences() {
        let expr = compile("\"Jenis Kelamin\" contains \"laki-laki\"").unwrap();
        let result = filter_rows(&table(), &expr);
        assert_eq!(result.count, 3);
        assert_eq!(result.sample_names, vec!["Budi", "Agus", "Joko"]);
        assert_eq!(summarize(&result), "Ditemukan 3 data yang cocok. Nama: Budi, Agus, Joko.");
    }

    #[test]
    fn conjunction_narrows_matches() {
        let expr = compile(
            "\"Jenis Kelamin\" contains \"laki-laki\" and \"Agama\" equals \"islam\"",
        )
        .unwrap();
        let result = filter_rows(&table(), &expr);
        assert_eq!(result.count, 2);
    }

    #[test]
    fn no_match_yields_zero_and_no_names() {
        let expr = compile("\"Agama\" equals \"buddha\"").unwrap();
        let result = filter_rows(&table(), &expr);
        assert_eq!(result.count, 0);
        assert!(result.sample_names.is_empty());
        assert_eq!(summarize(&result), "Ditemukan 0 data yang cocok.");
    }

    #[test]
    fn large_match_sets_skip_names() {
        let expr = compile("\"Nama\" != \"\"").unwrap();
        let result = filter_rows(&table(), &expr);
        assert_eq!(result.count, 5);
        assert!(result.sample_names.is_empty());
    }

    #[test]
    fn strips_plain_fences() {
        let raw = "```\n\"Agama\" contains \"islam\"\n```";
        assert_eq!(strip_code_fences(raw), "\"Agama\" contains \"islam\"");
    }

    #[test]
    fn strips_language_tagged_fences() {
        let raw = "```text\n\"Agama\" contains \"islam\"\n```";
        assert_eq!(strip_code_fences(raw), "\"Agama\" contains \"islam\"");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            strip_code_fences("\"Agama\" contains \"islam\""),
            "\"Agama\" contains \"islam\""
        );
    }
}
