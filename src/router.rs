//! Query router and answer assembler.
//!
//! Every question walks the same line: keyword intents first, then the
//! response cache, then an LLM classification into one of three reasoning
//! paths (structured data, document retrieval, casual conversation), and
//! finally a cache write. Classifier failure fails the request — guessing
//! a category would produce confidently wrong answers.
//!
//! ```text
//! question ──▶ INTENT_CHECK ──▶ CACHE_CHECK ──▶ CLASSIFY ──▶ DATA_QUERY
//!                  │                 │                        GENERAL_QUERY
//!                  ▼                 ▼                        CHITCHAT
//!                DONE              DONE                          │
//!                                                  CACHE_WRITE ◀─┘
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analyst;
use crate::cache;
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, Embedder};
use crate::intents::{detect_intent, load_intents, Intent};
use crate::llm::{CompletionOptions, LlmClient};
use crate::migrate;
use crate::models::Answer;
use crate::progress::IndexState;
use crate::retrieval::{self, KNOWLEDGE_BASE_NOT_READY};
use crate::stats::{load_statistics, StatisticsTable};
use crate::vector_index::VectorIndex;

/// The classifier's verdict for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    DataQuery,
    GeneralQuery,
    Chitchat,
}

impl Category {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "data_query" => Some(Category::DataQuery),
            "general_query" => Some(Category::GeneralQuery),
            "chitchat" => Some(Category::Chitchat),
            _ => None,
        }
    }

    /// Tag written next to cached answers.
    pub fn source_tag(&self) -> &'static str {
        match self {
            Category::DataQuery => "data_query",
            Category::GeneralQuery => "general_query",
            Category::Chitchat => "chitchat",
        }
    }
}

/// Everything a request needs, owned once and shared across the CLI and
/// HTTP surfaces. The statistics table and vector index are read-mostly
/// and replaced wholesale on reload.
pub struct ChatContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub llm: LlmClient,
    pub embedder: Arc<dyn Embedder>,
    pub intents: Vec<Intent>,
    pub statistics: RwLock<StatisticsTable>,
    pub index: RwLock<Option<VectorIndex>>,
    pub index_state: Arc<IndexState>,
}

impl ChatContext {
    /// Wire up the full context: database, LLM client, embedder, intents,
    /// statistics snapshot, and the persisted vector index if one exists.
    pub async fn new(config: Config) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;

        let llm = LlmClient::new(&config.llm)?;
        let embedder = create_embedder(&config.embedding)?;
        let intents = load_intents(&config.storage.intents_path)?;

        let statistics = match load_statistics(&config.storage.statistics_path) {
            Ok(table) => {
                println!(
                    "Statistics ready with headers: {}",
                    table.headers.join(", ")
                );
                table
            }
            Err(e) => {
                eprintln!("Warning: could not load statistics file: {}", e);
                StatisticsTable::default()
            }
        };

        let index = if VectorIndex::exists(&config.storage.index_dir) {
            let loaded = VectorIndex::load(&config.storage.index_dir)?;
            println!("Vector index loaded ({} chunks).", loaded.len());
            Some(loaded)
        } else {
            eprintln!(
                "Warning: no vector index at {}. Run an indexing pass to build it.",
                config.storage.index_dir.display()
            );
            None
        };

        Ok(Self {
            config,
            pool,
            llm,
            embedder,
            intents,
            statistics: RwLock::new(statistics),
            index: RwLock::new(index),
            index_state: Arc::new(IndexState::new()),
        })
    }

    /// Answer one question. The router entry point.
    pub async fn answer_question(
        &self,
        question: &str,
        session_id: Option<String>,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            bail!("Pertanyaan kosong.");
        }

        // The session id travels with the conversation: echo it back, and
        // only mint a fresh one for a first contact.
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Keyword intents answer in O(1) and skip the cache entirely.
        if let Some(canned) = detect_intent(&self.intents, question) {
            return Ok(Answer {
                answer: canned.to_string(),
                session_id,
            });
        }

        if let Some(cached) = cache::get(&self.pool, self.config.cache.ttl_secs, question).await? {
            return Ok(Answer {
                answer: cached,
                session_id,
            });
        }

        let category = self.classify(question).await?;

        let answer = match category {
            Category::DataQuery => {
                let statistics = self.statistics.read().await;
                let index = self.index.read().await;
                analyst::run_data_query(
                    &self.llm,
                    self.embedder.as_ref(),
                    &statistics,
                    index.as_ref(),
                    question,
                    self.config.retrieval.top_k,
                )
                .await?
            }
            Category::GeneralQuery => {
                let index = self.index.read().await;
                match index.as_ref() {
                    Some(index) => {
                        retrieval::answer_from_documents(
                            &self.llm,
                            self.embedder.as_ref(),
                            index,
                            question,
                            self.config.retrieval.top_k,
                        )
                        .await?
                    }
                    None => {
                        // Transient state; caching it would pin the failure
                        // for a full TTL window.
                        return Ok(Answer {
                            answer: KNOWLEDGE_BASE_NOT_READY.to_string(),
                            session_id,
                        });
                    }
                }
            }
            Category::Chitchat => self.chitchat(question).await?,
        };

        cache::put(&self.pool, question, &answer, category.source_tag()).await?;

        Ok(Answer { answer, session_id })
    }

    /// Classify a question into exactly one category via structured output.
    /// Malformed classifier output is a hard failure, never a default.
    async fn classify(&self, question: &str) -> Result<Category> {
        let prompt = format!(
            r#"You are a routing agent for a village chatbot. Classify the user's question into one of the following categories:

1. "data_query" -> Questions about structured data like gender, age, education, religion, number of people, or citizenship. These relate to statistics stored in a spreadsheet.
Examples:
- Berapa jumlah penduduk laki-laki?
- Berapa warga yang beragama Islam?
- Siapa saja yang sedang menempuh pendidikan SMA?

2. "general_query" -> Questions about documents like regulations, procedures, policies, or written rules found in uploaded PDF/DOCX files.
Examples:
- Apa isi peraturan desa tentang pengelolaan sampah?
- Apakah ada dokumen tentang kebersihan lingkungan?

3. "chitchat" -> Greetings or casual questions not related to data or documents.
Examples:
- Hai, siapa namamu?
- Kamu robot ya?

User question: "{question}"

Respond ONLY with a JSON object like: {{"category": "data_query"}}"#,
        );

        let response = self
            .llm
            .complete(
                &prompt,
                &CompletionOptions {
                    temperature: 0.0,
                    json_object: true,
                    ..Default::default()
                },
            )
            .await
            .context("Question classification failed")?;

        let parsed: serde_json::Value =
            serde_json::from_str(&response).context("Classifier returned malformed JSON")?;
        let category = parsed
            .get("category")
            .and_then(|c| c.as_str())
            .and_then(Category::parse)
            .with_context(|| format!("Classifier returned an unknown category: {}", response))?;

        Ok(category)
    }

    async fn chitchat(&self, question: &str) -> Result<String> {
        let cfg = &self.config.llm;
        let prompt = format!(
            "{persona} The user says: \"{question}\". Respond briefly and politely in {language}.",
            persona = cfg.persona,
            question = question,
            language = cfg.language,
        );

        self.llm
            .complete(
                &prompt,
                &CompletionOptions {
                    model: Some(cfg.chat_model.clone()),
                    temperature: cfg.chat_temperature,
                    ..Default::default()
                },
            )
            .await
    }

    /// Swap in a freshly loaded statistics table.
    pub async fn reload_statistics(&self) -> Result<()> {
        let table = load_statistics(&self.config.storage.statistics_path)?;
        println!(
            "Statistics reloaded with headers: {}",
            table.headers.join(", ")
        );
        *self.statistics.write().await = table;
        Ok(())
    }

    /// Swap in the persisted vector index (after an indexing run).
    pub async fn reload_index(&self) -> Result<()> {
        let loaded = VectorIndex::load(&self.config.storage.index_dir)?;
        println!("Vector index reloaded ({} chunks).", loaded.len());
        *self.index.write().await = Some(loaded);
        Ok(())
    }
}
