//! `FastEmbed`-based semantic embedder.
//!
//! Uses `BGELargeENV15` (1024 dimensions), matching the reference model the
//! vector store's HNSW collection is configured for. Only available when
//! the `fastembed-embeddings` feature is enabled.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};

use crate::embedding::{Embedder, DEFAULT_DIMENSIONS};
use crate::error::{EmbeddingError, Error, Result};

static EMBEDDING_MODEL: OnceLock<std::sync::Mutex<TextEmbedding>> = OnceLock::new();

/// `FastEmbed` embedder using `BGELargeENV15`.
///
/// The model is lazily loaded on first `embed`/`embed_batch` call to
/// preserve cold start time.
pub struct FastEmbedEmbedder {
    model_name: &'static str,
}

impl FastEmbedEmbedder {
    /// Creates a new `FastEmbed` embedder. The model itself is not loaded
    /// until the first call to [`Embedder::embed`].
    ///
    /// # Errors
    ///
    /// Never fails; construction cannot fail ahead of model load, but
    /// returns `Result` to match the trait's `create_embedder` contract.
    #[allow(clippy::unnecessary_wraps)]
    pub fn new() -> Result<Self> {
        Ok(Self { model_name: "BGELargeENV15" })
    }

    fn get_model() -> Result<&'static std::sync::Mutex<TextEmbedding>> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        let options = TextInitOptions::new(EmbeddingModel::BGELargeENV15).with_show_download_progress(false);
        let model = TextEmbedding::try_new(options).map_err(|e| Error::Embedding(EmbeddingError::ModelLoadFailed(e.to_string())))?;

        let _ = EMBEDDING_MODEL.set(std::sync::Mutex::new(model));
        EMBEDDING_MODEL.get().ok_or_else(|| Error::Embedding(EmbeddingError::ModelLoadFailed("model initialization race".to_string())))
    }

    /// Returns the model name, for diagnostics.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }

    fn run_embed(texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let model = Self::get_model()?;
        let mut model = model.lock().map_err(|e| Error::Embedding(EmbeddingError::InferenceFailed(format!("model lock poisoned: {e}"))))?;

        // fastembed's ONNX runtime can panic on malformed inputs; contain it
        // rather than bringing down the whole ingestion pipeline.
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(texts, None)));

        let embeddings = result
            .map_err(|panic_info| {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Error::Embedding(EmbeddingError::InferenceFailed(format!("onnx runtime panic: {msg}")))
            })?
            .map_err(|e| Error::Embedding(EmbeddingError::InferenceFailed(e.to_string())))?;

        for embedding in &embeddings {
            if embedding.len() != DEFAULT_DIMENSIONS {
                return Err(Error::Embedding(EmbeddingError::DimensionMismatch { actual: embedding.len(), expected: DEFAULT_DIMENSIONS }));
            }
        }

        Ok(embeddings)
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::Embedding(EmbeddingError::EmptyInput));
        }

        Self::run_embed(vec![text])?.into_iter().next().ok_or_else(|| Error::Embedding(EmbeddingError::InferenceFailed("no embedding returned".to_string())))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(Error::Embedding(EmbeddingError::EmptyInput));
        }

        Self::run_embed(texts.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_without_loading_the_model() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        assert_eq!(embedder.dimensions(), DEFAULT_DIMENSIONS);
        assert_eq!(embedder.model_name(), "BGELargeENV15");
    }

    #[test]
    fn embedding_empty_text_is_rejected() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        assert!(embedder.embed("").is_err());
    }

    #[test]
    fn embed_batch_of_empty_slice_is_empty() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn embed_batch_rejects_any_empty_member() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        assert!(embedder.embed_batch(&["valid", ""]).is_err());
    }

    #[test]
    #[ignore = "requires fastembed model download"]
    fn embed_produces_a_1024_dim_vector() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        let embedding = embedder.embed("Hello, world!").unwrap();
        assert_eq!(embedding.len(), DEFAULT_DIMENSIONS);
    }

    #[test]
    #[ignore = "requires fastembed model download"]
    fn embed_batch_produces_one_vector_per_input() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        let embeddings = embedder.embed_batch(&["Hello", "World"]).unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), DEFAULT_DIMENSIONS);
    }
}
