//! Indexing pipeline integration tests.
//!
//! Runs the real pipeline against temp directories and a deterministic
//! in-process embedder, exercising status transitions, idempotence,
//! rebuild-vs-incremental behavior, and per-batch failure isolation.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use laakon::config::{
    CacheConfig, ChunkingConfig, Config, DbConfig, EmbeddingConfig, IndexingConfig, LlmConfig,
    RetrievalConfig, ServerConfig, StorageConfig,
};
use laakon::embedding::Embedder;
use laakon::models::DocumentStatus;
use laakon::pipeline::{run_indexing, IndexMode};
use laakon::progress::IndexState;
use laakon::vector_index::VectorIndex;
use laakon::{db, migrate, registry};

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("data/laakon.sqlite"),
        },
        storage: StorageConfig {
            upload_dir: root.join("uploads"),
            statistics_path: root.join("statistik.csv"),
            index_dir: root.join("vector_index"),
            intents_path: root.join("intents.json"),
        },
        chunking: ChunkingConfig {
            chunk_size: 1000,
            overlap: 200,
        },
        indexing: IndexingConfig { batch_size: 1 },
        embedding: EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "unused".to_string(),
            dims: 4,
            url: Some("http://127.0.0.1:9".to_string()),
            api_key_env: "PATH".to_string(),
            max_concurrency: 2,
            max_retries: 0,
            timeout_secs: 1,
        },
        llm: LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key_env: "PATH".to_string(),
            model: "unused".to_string(),
            chat_model: "unused".to_string(),
            persona: "You are a test assistant.".to_string(),
            language: "Indonesian".to_string(),
            answer_temperature: 0.5,
            chat_temperature: 0.7,
            timeout_secs: 1,
            max_retries: 0,
        },
        retrieval: RetrievalConfig { top_k: 10 },
        cache: CacheConfig { ttl_secs: 300 },
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

/// Deterministic embedder: hashes text bytes into a 4-dim vector.
struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = [0.0f32; 4];
                for (i, b) in t.bytes().enumerate() {
                    v[i % 4] += b as f32 / 255.0;
                }
                v.to_vec()
            })
            .collect())
    }
}

/// Fails any batch containing the marker text; succeeds otherwise.
struct FlakyEmbedder {
    marker: &'static str,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.marker)) {
            anyhow::bail!("simulated embedding outage");
        }
        FakeEmbedder.embed(texts).await
    }
}

async fn setup(config: &Config) -> SqlitePool {
    let pool = db::connect(&config.db.path).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    std::fs::create_dir_all(&config.storage.upload_dir).unwrap();
    pool
}

/// Write a CSV into the upload dir and register it. Returns the record id.
async fn add_csv_doc(pool: &SqlitePool, config: &Config, name: &str, contents: &str) -> i64 {
    let stored = format!("{}.csv", uuid::Uuid::new_v4());
    std::fs::write(config.storage.upload_dir.join(&stored), contents).unwrap();
    registry::register_document(
        pool,
        &stored,
        name,
        &config.storage.upload_dir.to_string_lossy(),
    )
    .await
    .unwrap()
}

async fn status_of(pool: &SqlitePool, id: i64) -> String {
    registry::get_document(pool, id).await.unwrap().unwrap().status
}

async fn run(
    config: &Config,
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    mode: IndexMode,
) -> laakon::pipeline::IndexReport {
    let state = Arc::new(IndexState::new());
    let guard = state.try_begin().unwrap();
    run_indexing(config, pool, embedder, mode, &guard)
        .await
        .unwrap()
}

#[tokio::test]
async fn incremental_run_indexes_pending_documents() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    let id_a = add_csv_doc(&pool, &config, "penduduk.csv", "Nama,Umur\nBudi,30\n").await;
    let id_b = add_csv_doc(&pool, &config, "fasilitas.csv", "Fasilitas\nBalai Desa\n").await;

    let report = run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.documents_failed, 0);
    assert_eq!(report.chunks_extracted, 2);
    assert_eq!(report.batches_ok, 2);

    assert_eq!(status_of(&pool, id_a).await, "INDEXED");
    assert_eq!(status_of(&pool, id_b).await, "INDEXED");

    let index = VectorIndex::load(&config.storage.index_dir).unwrap();
    assert_eq!(index.len(), 2);
}

#[tokio::test]
async fn incremental_run_twice_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    add_csv_doc(&pool, &config, "penduduk.csv", "Nama\nBudi\nSari\n").await;

    let first = run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;
    assert_eq!(first.documents_processed, 1);
    let len_after_first = VectorIndex::load(&config.storage.index_dir).unwrap().len();

    // Nothing is PENDING anymore: the second run must not touch the index.
    let second = run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;
    assert_eq!(second.documents_processed, 0);
    assert_eq!(second.chunks_extracted, 0);
    assert_eq!(second.batches_ok, 0);

    let len_after_second = VectorIndex::load(&config.storage.index_dir).unwrap().len();
    assert_eq!(len_after_first, len_after_second);
}

#[tokio::test]
async fn missing_file_is_marked_and_skipped() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    let id = registry::register_document(
        &pool,
        "ghost.csv",
        "ghost.csv",
        &config.storage.upload_dir.to_string_lossy(),
    )
    .await
    .unwrap();

    let report = run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;

    assert_eq!(report.documents_failed, 1);
    assert_eq!(status_of(&pool, id).await, DocumentStatus::ErrorNotFound.as_str());
    // No chunks accumulated: the index must not exist.
    assert!(!VectorIndex::exists(&config.storage.index_dir));
}

#[tokio::test]
async fn unsupported_extension_is_marked() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    let stored = "foto.png";
    std::fs::write(config.storage.upload_dir.join(stored), b"binary").unwrap();
    let id = registry::register_document(
        &pool,
        stored,
        "foto.png",
        &config.storage.upload_dir.to_string_lossy(),
    )
    .await
    .unwrap();

    run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;
    assert_eq!(status_of(&pool, id).await, DocumentStatus::Unsupported.as_str());
}

#[tokio::test]
async fn parse_failure_marks_one_document_and_spares_the_rest() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    let stored = "rusak.pdf";
    std::fs::write(config.storage.upload_dir.join(stored), b"not a real pdf").unwrap();
    let bad = registry::register_document(
        &pool,
        stored,
        "rusak.pdf",
        &config.storage.upload_dir.to_string_lossy(),
    )
    .await
    .unwrap();
    let good = add_csv_doc(&pool, &config, "penduduk.csv", "Nama\nBudi\n").await;

    let report = run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;

    assert_eq!(report.documents_failed, 1);
    assert_eq!(report.documents_processed, 1);
    assert_eq!(status_of(&pool, bad).await, DocumentStatus::ErrorParsing.as_str());
    assert_eq!(status_of(&pool, good).await, "INDEXED");
    assert_eq!(VectorIndex::load(&config.storage.index_dir).unwrap().len(), 1);
}

#[tokio::test]
async fn rebuild_discards_and_replaces_the_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    add_csv_doc(&pool, &config, "a.csv", "Kolom\nsatu\n").await;
    run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;
    assert_eq!(VectorIndex::load(&config.storage.index_dir).unwrap().len(), 1);

    add_csv_doc(&pool, &config, "b.csv", "Kolom\ndua\n").await;
    let report = run(&config, &pool, &FakeEmbedder, IndexMode::Rebuild).await;

    // Rebuild reprocesses everything from scratch; the index holds exactly
    // the chunks of both documents, not duplicates of the first.
    assert_eq!(report.documents_processed, 2);
    assert_eq!(VectorIndex::load(&config.storage.index_dir).unwrap().len(), 2);
}

#[tokio::test]
async fn incremental_appends_to_existing_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    add_csv_doc(&pool, &config, "a.csv", "Kolom\nsatu\n").await;
    run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;

    add_csv_doc(&pool, &config, "b.csv", "Kolom\ndua\n").await;
    run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;

    assert_eq!(VectorIndex::load(&config.storage.index_dir).unwrap().len(), 2);
}

#[tokio::test]
async fn failed_batch_is_skipped_and_the_rest_is_persisted() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    add_csv_doc(&pool, &config, "a.csv", "Kolom\naman satu\n").await;
    add_csv_doc(&pool, &config, "b.csv", "Kolom\nGAGAL di sini\n").await;
    add_csv_doc(&pool, &config, "c.csv", "Kolom\naman dua\n").await;

    let embedder = FlakyEmbedder { marker: "GAGAL" };
    let report = run(&config, &pool, &embedder, IndexMode::Incremental).await;

    assert_eq!(report.batches_ok, 2);
    assert_eq!(report.batches_failed, 1);

    let index = VectorIndex::load(&config.storage.index_dir).unwrap();
    assert_eq!(index.len(), 2);
}

#[tokio::test]
async fn empty_run_terminates_without_creating_an_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = setup(&config).await;

    let report = run(&config, &pool, &FakeEmbedder, IndexMode::Incremental).await;

    assert_eq!(report.documents_processed, 0);
    assert!(!VectorIndex::exists(&config.storage.index_dir));
}
