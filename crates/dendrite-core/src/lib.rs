//! Core types shared by the dendrite vector store crates.
//!
//! This crate is deliberately small: it holds the [`Document`] record, the
//! [`Embeddings`] collaborator trait, and the unified [`DendriteError`]
//! type. Storage backends live in their own crates (see `dendrite-pg`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document with content and metadata, used throughout the retrieval
/// pipeline.
///
/// `id` is the row identity in a backing store. Stores that generate ids
/// server-side leave it empty on insert and fill it on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Trait for embedding text into fixed-width vectors.
///
/// Implementations are opaque to the stores: all that is required is that
/// every vector produced for one store has the dimensionality the store was
/// configured with.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts (for batch document embedding).
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, DendriteError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DendriteError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the dendrite crates.
#[derive(Debug, Error)]
pub enum DendriteError {
    /// A caller-supplied argument was rejected before any I/O happened:
    /// mutually exclusive filters, unknown join or comparator tokens, a
    /// metric the chosen extension does not support, a missing not-null
    /// extra column, and the like.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Provisioning DDL failed, typically because a pre-existing table is
    /// incompatible. The driver message is surfaced verbatim.
    #[error("schema error: {0}")]
    Schema(String),
    /// Driver-level failure: connectivity, pool exhaustion, timeout, or
    /// cancellation. Surfaced to the caller; the store does not retry.
    #[error("database error: {0}")]
    Database(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    /// A value could not be converted at the store boundary, e.g. an
    /// embedding column that did not deserialize back into a vector.
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_new() {
        let doc = Document::new("d1", "hello");
        assert_eq!(doc.id, "d1");
        assert_eq!(doc.content, "hello");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn document_with_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("page".to_string(), Value::from(3));
        let doc = Document::with_metadata("d2", "body", metadata);
        assert_eq!(doc.metadata.get("page").unwrap(), 3);
    }

    #[test]
    fn document_serde_round_trip() {
        let doc = Document::new("d3", "content");
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn error_display() {
        let err = DendriteError::InvalidArgument("both filters set".to_string());
        assert_eq!(err.to_string(), "invalid argument: both filters set");
    }
}
