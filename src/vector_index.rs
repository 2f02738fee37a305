//! Nearest-neighbor store over embedded chunks.
//!
//! A flat index: chunk texts and provenance live in a document store, their
//! embeddings in a parallel vector list. Search is a brute-force cosine
//! scan, which is plenty for a corpus of village documents.
//!
//! On disk the index is a directory with two files:
//!
//! | File | Contents |
//! |------|----------|
//! | `docstore.json` | model name, dims, and every entry's text + metadata |
//! | `vectors.bin` | all embeddings as little-endian f32, in entry order |
//!
//! The directory is wholly replaced on a rebuild run and appended to
//! otherwise; readers only ever observe a fully written index because the
//! pipeline saves once, after all batches.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::models::{ChunkMetadata, TextChunk};

const DOCSTORE_FILE: &str = "docstore.json";
const VECTORS_FILE: &str = "vectors.bin";

/// One persisted entry: a chunk plus its identifier. Never mutated after
/// insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A search result with its similarity score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct DocStore {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

/// In-memory vector index, loadable from and persistable to a directory.
pub struct VectorIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Create a new index from an initial set of chunks.
    pub async fn build(chunks: &[TextChunk], embedder: &dyn Embedder) -> Result<Self> {
        let mut index = Self {
            model: embedder.model_name().to_string(),
            dims: embedder.dims(),
            entries: Vec::new(),
            vectors: Vec::new(),
        };
        index.append(chunks, embedder).await?;
        Ok(index)
    }

    /// Embed `chunks` and add them to the index.
    pub async fn append(&mut self, chunks: &[TextChunk], embedder: &dyn Embedder) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            bail!(
                "Embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        for (chunk, vector) in chunks.iter().zip(vectors) {
            self.entries.push(IndexEntry {
                id: Uuid::new_v4().to_string(),
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
            });
            self.vectors.push(vector);
        }
        Ok(())
    }

    /// Top-`k` entries by cosine similarity against a precomputed query
    /// vector.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<SearchHit> = self
            .entries
            .iter()
            .zip(self.vectors.iter())
            .map(|(entry, vec)| SearchHit {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(query_vec, vec),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Embed `query` and return the top-`k` most similar chunks.
    pub async fn similarity_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let query_vec = embedder.embed_query(query).await?;
        Ok(self.search(&query_vec, k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a persisted index exists at `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(DOCSTORE_FILE).is_file()
    }

    /// Delete a persisted index directory, if present.
    pub fn discard(dir: &Path) -> Result<()> {
        if dir.exists() {
            std::fs::remove_dir_all(dir)
                .with_context(|| format!("Failed to remove index at {}", dir.display()))?;
        }
        Ok(())
    }

    /// Persist the index. This is the single visibility point for readers:
    /// the pipeline calls it once, after all batches are in.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let store = DocStore {
            model: self.model.clone(),
            dims: self.dims,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&store)?;
        std::fs::write(dir.join(DOCSTORE_FILE), json)?;

        let mut blob = Vec::with_capacity(self.vectors.len() * self.dims * 4);
        for vec in &self.vectors {
            blob.extend_from_slice(&vec_to_blob(vec));
        }
        std::fs::write(dir.join(VECTORS_FILE), blob)?;

        Ok(())
    }

    /// Load a persisted index from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(DOCSTORE_FILE))
            .with_context(|| format!("No vector index at {}", dir.display()))?;
        let store: DocStore = serde_json::from_str(&json).context("Corrupt docstore.json")?;

        let blob = std::fs::read(dir.join(VECTORS_FILE))
            .with_context(|| format!("Missing vectors.bin at {}", dir.display()))?;

        let stride = store.dims * 4;
        if stride == 0 || blob.len() != store.entries.len() * stride {
            bail!(
                "Corrupt vector index: {} entries but {} vector bytes (dims {})",
                store.entries.len(),
                blob.len(),
                store.dims
            );
        }

        let vectors: Vec<Vec<f32>> = blob.chunks_exact(stride).map(blob_to_vec).collect();

        Ok(Self {
            model: store.model,
            dims: store.dims,
            entries: store.entries,
            vectors,
        })
    }
}
