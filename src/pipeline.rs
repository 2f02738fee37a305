//! Indexing pipeline orchestration.
//!
//! Coordinates the full indexing flow: registry → extraction + chunking →
//! provenance tagging → batched embedding → vector index persistence →
//! registry status transitions.
//!
//! Failure isolation: a missing file, an unsupported format, or a parse
//! error marks that one document and moves on; a failed embedding batch is
//! logged and skipped. Only losing the registry itself aborts the run. The
//! index is persisted exactly once, after all batches, so concurrent
//! readers never observe a half-written run.

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::{extract_chunks, ExtractError};
use crate::models::{ChunkMetadata, DocumentStatus, TextChunk};
use crate::progress::IndexRunGuard;
use crate::registry;
use crate::vector_index::VectorIndex;

/// Which documents a run considers, and what happens to the existing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Only PENDING documents; the persisted index is loaded and appended to.
    Incremental,
    /// Every document; the persisted index is discarded and rebuilt.
    Rebuild,
}

/// Counters for one indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub documents_processed: u64,
    pub documents_failed: u64,
    pub chunks_extracted: usize,
    pub batches_ok: u64,
    pub batches_failed: u64,
}

/// Run one indexing pass. The caller holds the run guard, which both
/// publishes progress and enforces the single-run invariant.
pub async fn run_indexing(
    config: &Config,
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    mode: IndexMode,
    guard: &IndexRunGuard,
) -> Result<IndexReport> {
    let mut report = IndexReport::default();

    // Registry unavailability is fatal for the whole run.
    let candidates = match mode {
        IndexMode::Incremental => registry::list_pending(pool).await,
        IndexMode::Rebuild => registry::list_all(pool).await,
    }
    .context("Could not fetch documents from the registry")?;

    let total_docs = candidates.len();
    guard.update(
        0,
        format!("Menemukan {} dokumen untuk diproses...", total_docs),
    );

    let mut pending: Vec<TextChunk> = Vec::new();

    for (done, record) in candidates.iter().enumerate() {
        let path = Path::new(&record.file_path).join(&record.file_name);

        if !path.is_file() {
            eprintln!(
                "Warning: file not found for '{}': {}",
                record.original_name,
                path.display()
            );
            registry::update_status(pool, record.id, DocumentStatus::ErrorNotFound).await?;
            report.documents_failed += 1;
            continue;
        }

        // Extraction is CPU-bound (PDF parsing, XML walking); keep it off
        // the async workers.
        let task_path = path.clone();
        let task_name = record.original_name.clone();
        let task_chunking = config.chunking.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_chunks(&task_path, &task_name, &task_chunking)
        })
        .await
        .context("Extraction task panicked")?;

        match extracted {
            Ok(texts) => {
                let uploaded_at = chrono::DateTime::from_timestamp(record.upload_timestamp, 0)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default();
                report.chunks_extracted += texts.len();
                pending.extend(texts.into_iter().map(|text| TextChunk {
                    text,
                    metadata: ChunkMetadata {
                        source: record.original_name.clone(),
                        uploaded_at: uploaded_at.clone(),
                        file_id: record.id,
                    },
                }));
                registry::mark_indexed(pool, record.id).await?;
                report.documents_processed += 1;
            }
            Err(ExtractError::Unsupported(ext)) => {
                eprintln!(
                    "Warning: unsupported format '{}' for '{}'",
                    ext, record.original_name
                );
                registry::update_status(pool, record.id, DocumentStatus::Unsupported).await?;
                report.documents_failed += 1;
            }
            Err(e) => {
                eprintln!("Warning: failed to parse '{}': {}", record.original_name, e);
                registry::update_status(pool, record.id, DocumentStatus::ErrorParsing).await?;
                report.documents_failed += 1;
            }
        }

        // Extraction covers the first half of the progress bar.
        let percent = ((done + 1) as f64 / total_docs.max(1) as f64 * 50.0).round() as u32;
        guard.update(
            percent,
            format!("Memproses dokumen {}/{}...", done + 1, total_docs),
        );
    }

    if pending.is_empty() {
        guard.finish("Tidak ada dokumen yang akan di-index.");
        return Ok(report);
    }

    let index_dir = &config.storage.index_dir;
    let batch_size = config.indexing.batch_size;
    let total_batches = pending.len().div_ceil(batch_size);
    guard.update(
        50,
        format!("Menyimpan data ke otak AI ({} batch)...", total_batches),
    );

    if mode == IndexMode::Rebuild {
        VectorIndex::discard(index_dir)?;
    }

    // Incremental runs extend the persisted index; rebuild (or a first run)
    // starts from nothing and creates it from the first successful batch.
    let mut index: Option<VectorIndex> =
        if mode == IndexMode::Incremental && VectorIndex::exists(index_dir) {
            Some(VectorIndex::load(index_dir)?)
        } else {
            None
        };

    for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
        let result = match index.as_mut() {
            Some(existing) => existing.append(batch, embedder).await,
            None => match VectorIndex::build(batch, embedder).await {
                Ok(built) => {
                    index = Some(built);
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(()) => {
                report.batches_ok += 1;
                let percent =
                    50 + ((batch_no + 1) as f64 / total_batches as f64 * 50.0).round() as u32;
                guard.update(
                    percent.min(100),
                    format!(
                        "Menyimpan data ke otak AI: batch {}/{}...",
                        batch_no + 1,
                        total_batches
                    ),
                );
            }
            Err(e) => {
                eprintln!("Warning: embedding batch {} failed: {}", batch_no + 1, e);
                report.batches_failed += 1;
            }
        }
    }

    if let Some(index) = &index {
        index.save(index_dir)?;
    }

    guard.finish("Indexing selesai! Semua dokumen siap digunakan AI.");
    Ok(report)
}
