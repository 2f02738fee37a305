//! Core data models used throughout laakon.
//!
//! These types represent the documents, chunks, and cache entries that flow
//! through the indexing and answering pipelines.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered document.
///
/// The indexing pipeline advances a record's status monotonically within a
/// single pass: `Pending` documents are picked up, then land in `Indexed`
/// or one of the error states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Indexed,
    ErrorNotFound,
    ErrorParsing,
    Unsupported,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Indexed => "INDEXED",
            DocumentStatus::ErrorNotFound => "ERROR_NOT_FOUND",
            DocumentStatus::ErrorParsing => "ERROR_PARSING",
            DocumentStatus::Unsupported => "UNSUPPORTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(DocumentStatus::Pending),
            "INDEXED" => Some(DocumentStatus::Indexed),
            "ERROR_NOT_FOUND" => Some(DocumentStatus::ErrorNotFound),
            "ERROR_PARSING" => Some(DocumentStatus::ErrorParsing),
            "UNSUPPORTED" => Some(DocumentStatus::Unsupported),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document registered for indexing, stored in SQLite.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    /// Name of the stored file on disk (unique suffix + extension).
    pub file_name: String,
    /// Name the document was uploaded under; shown to users and used as
    /// chunk provenance.
    pub original_name: String,
    /// Directory the stored file lives in.
    pub file_path: String,
    pub status: String,
    pub upload_timestamp: i64,
    pub last_indexed_timestamp: Option<i64>,
}

/// Provenance attached to every chunk before it enters the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Original document name.
    pub source: String,
    /// RFC 3339 upload time of the source document.
    pub uploaded_at: String,
    /// Registry id of the source document.
    pub file_id: i64,
}

/// A bounded text segment produced from one document, paired with its
/// provenance. Exists only within one indexing pass until embedded and
/// persisted into the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A cached answer, keyed by the exact question string.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    /// Which answer path produced this entry (`data_query`, `general_query`,
    /// `chitchat`).
    pub source: String,
    pub created_at: i64,
    pub last_accessed: i64,
    pub usage_count: i64,
}

/// Per-status document counts for the admin surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentStats {
    pub total: i64,
    pub indexed: i64,
    pub pending: i64,
    pub failed: i64,
}

/// The router's final product: the answer text plus the conversation id it
/// belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub session_id: String,
}
