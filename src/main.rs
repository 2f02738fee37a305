//! # laakon CLI
//!
//! The `laakon` binary drives the chatbot backend: database setup, document
//! registration, indexing runs, one-off questions, cache administration,
//! and the HTTP server.
//!
//! ```bash
//! laakon --config ./config/laakon.toml <command>
//! ```
//!
//! Indexing runs as its own process invocation (`laakon index`), keeping
//! the embedding-heavy work away from the request-serving path.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use laakon::config::load_config;
use laakon::pipeline::{run_indexing, IndexMode};
use laakon::progress::IndexState;
use laakon::router::ChatContext;
use laakon::{cache, db, embedding, migrate, registry, server};

/// laakon — village-information chatbot backend.
#[derive(Parser)]
#[command(
    name = "laakon",
    about = "Village-information chatbot backend: document indexing and retrieval-augmented question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/laakon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and storage directories.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Manage registered documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Run an indexing pass over registered documents.
    ///
    /// Incremental by default: only PENDING documents are processed and the
    /// persisted vector index is appended to. With `--rebuild`, every
    /// document is reprocessed and the index is discarded and rebuilt.
    Index {
        /// Discard the vector index and rebuild it from all documents.
        #[arg(long)]
        rebuild: bool,
    },

    /// Ask the chatbot a single question.
    Ask {
        /// The question text.
        question: String,

        /// Session identifier, echoed back in the response.
        #[arg(long)]
        session: Option<String>,
    },

    /// Inspect and manage the answer cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum DocsAction {
    /// Copy a file into the upload directory and register it as PENDING.
    Add {
        /// File to register.
        file: PathBuf,

        /// Name to register the document under (defaults to the file name).
        #[arg(long)]
        name: Option<String>,
    },

    /// List registered documents, newest upload first.
    List,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached answers, most recently used first.
    List,
    /// Drop every cached answer.
    Clear,
    /// Drop one cached answer by id.
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;
            std::fs::create_dir_all(&config.storage.upload_dir)?;
            pool.close().await;
            println!("initialized {}", config.db.path.display());
        }

        Commands::Docs { action } => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;

            match action {
                DocsAction::Add { file, name } => {
                    let original_name = name.unwrap_or_else(|| {
                        file.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "document".to_string())
                    });

                    std::fs::create_dir_all(&config.storage.upload_dir)?;
                    let ext = file
                        .extension()
                        .map(|e| format!(".{}", e.to_string_lossy()))
                        .unwrap_or_default();
                    let stored_name = format!("{}{}", uuid::Uuid::new_v4(), ext);
                    std::fs::copy(&file, config.storage.upload_dir.join(&stored_name))?;

                    let id = registry::register_document(
                        &pool,
                        &stored_name,
                        &original_name,
                        &config.storage.upload_dir.to_string_lossy(),
                    )
                    .await?;

                    println!("registered '{}' (id {})", original_name, id);
                    println!("run `laakon index` to make it searchable");
                }
                DocsAction::List => {
                    let documents = registry::list_documents(&pool).await?;
                    if documents.is_empty() {
                        println!("no documents registered");
                    }
                    for doc in documents {
                        println!(
                            "{:>4}  {:<16}  {}",
                            doc.id, doc.status, doc.original_name
                        );
                    }
                }
            }
            pool.close().await;
        }

        Commands::Index { rebuild } => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;
            let embedder = embedding::create_embedder(&config.embedding)?;

            let mode = if rebuild {
                IndexMode::Rebuild
            } else {
                IndexMode::Incremental
            };

            let state = Arc::new(IndexState::new());
            let guard = state.try_begin()?;
            let report = run_indexing(&config, &pool, embedder.as_ref(), mode, &guard).await?;
            drop(guard);

            if report.batches_ok > 0 {
                // The corpus changed; cached answers may be stale.
                cache::clear(&pool).await?;
            }

            println!(
                "index {}",
                if rebuild { "rebuild" } else { "incremental" }
            );
            println!("  documents processed: {}", report.documents_processed);
            println!("  documents failed: {}", report.documents_failed);
            println!("  chunks extracted: {}", report.chunks_extracted);
            println!("  batches ok: {}", report.batches_ok);
            println!("  batches failed: {}", report.batches_failed);
            println!("ok");

            pool.close().await;
        }

        Commands::Ask { question, session } => {
            let ctx = ChatContext::new(config).await?;
            let answer = ctx.answer_question(&question, session).await?;
            println!("{}", answer.answer);
            println!("(session {})", answer.session_id);
        }

        Commands::Cache { action } => {
            let pool = db::connect(&config.db.path).await?;
            migrate::run_migrations(&pool).await?;

            match action {
                CacheAction::List => {
                    let entries = cache::list(&pool).await?;
                    if entries.is_empty() {
                        println!("cache is empty");
                    }
                    for entry in entries {
                        println!(
                            "{:>4}  uses {:>3}  [{}]  {}",
                            entry.id, entry.usage_count, entry.source, entry.question
                        );
                    }
                }
                CacheAction::Clear => {
                    cache::clear(&pool).await?;
                    println!("cache cleared");
                }
                CacheAction::Delete { id } => {
                    cache::delete(&pool, id).await?;
                    println!("deleted cache entry {}", id);
                }
            }
            pool.close().await;
        }

        Commands::Serve => {
            let ctx = Arc::new(ChatContext::new(config).await?);
            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
