//! # laakon
//!
//! A village-information chatbot backend.
//!
//! laakon ingests heterogeneous documents (PDF, DOCX, spreadsheets),
//! indexes them for semantic retrieval, and answers natural-language
//! questions by routing each one to a structured-data query, a document
//! retrieval pass, or casual conversation — backed by a response cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Registry  │──▶│   Pipeline    │──▶│ VectorIndex │
//! │ (SQLite)  │   │ Extract+Chunk │   │  (on disk)  │
//! └───────────┘   │ Embed (batch) │   └──────┬──────┘
//!                 └──────────────┘          │
//!            ┌───────────────────────────────┤
//!            ▼                               ▼
//!      ┌───────────┐    ┌────────┐    ┌────────────┐
//!      │  Router   │───▶│ Analyst │    │ Retrieval  │
//!      │ ask/cache │    │ (table) │    │ (top-k)    │
//!      └───────────┘    └────────┘    └────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! laakon init                        # create the database
//! laakon docs add peraturan.pdf      # register a document
//! laakon index                       # incremental indexing run
//! laakon index --rebuild             # full rebuild
//! laakon ask "berapa jumlah laki laki"
//! laakon serve                       # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Overlapping text chunking |
//! | [`registry`] | Document registry client |
//! | [`extract`] | PDF/DOCX/spreadsheet text extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`vector_index`] | Persisted nearest-neighbor store |
//! | [`pipeline`] | Indexing pipeline orchestration |
//! | [`progress`] | Index progress state + single-run guard |
//! | [`cache`] | Answer cache with lazy TTL |
//! | [`intents`] | Keyword-intent matcher |
//! | [`stats`] | In-memory statistics table |
//! | [`predicate`] | Whitelisted row-filter grammar |
//! | [`llm`] | Chat-completion client |
//! | [`analyst`] | Structured data query engine |
//! | [`retrieval`] | Document-retrieval answer path |
//! | [`router`] | Query router and answer assembler |
//! | [`server`] | HTTP surface |

pub mod analyst;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod intents;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod predicate;
pub mod progress;
pub mod registry;
pub mod retrieval;
pub mod router;
pub mod server;
pub mod stats;
pub mod vector_index;
