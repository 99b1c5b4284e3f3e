//! Embedding adapter.
//!
//! Wraps fastembed behind a narrow trait so the pipeline only depends on a
//! deterministic `embed(text) -> vector` contract. The model is loaded once
//! at process start and the handle passed by reference to every consumer; a
//! failed load produces a handle that reports `Unavailable` on every call,
//! which the pipeline treats as a cache miss plus no cache write.

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use crate::error::EmbedderError;

/// Deterministic text-to-vector contract consumed by the pipeline.
pub trait TextEmbedder: Send + Sync {
    /// Embed one text into a unit-length vector of fixed dimension.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Whether the underlying model loaded. Health reporting only.
    fn available(&self) -> bool {
        true
    }
}

/// Production embedder backed by fastembed's AllMiniLM-L6-v2.
pub struct FastembedEmbedder {
    // fastembed needs &mut for inference.
    model: Mutex<TextEmbedding>,
}

impl FastembedEmbedder {
    /// Load the model. Called exactly once, at startup.
    pub fn init() -> Result<Self, EmbedderError> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| EmbedderError::Unavailable(e.to_string()))?;
        info!("embedding model loaded (all-MiniLM-L6-v2)");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl TextEmbedder for FastembedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbedderError::Unavailable("embedder lock poisoned".to_string()))?;
        let mut embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbedderError::Unavailable(e.to_string()))?;
        let mut embedding = embeddings
            .pop()
            .ok_or_else(|| EmbedderError::Unavailable("model returned no embedding".to_string()))?;
        normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Stand-in handle used when the model failed to load at startup. Keeps the
/// service up in evidence-only mode instead of refusing to boot.
pub struct DisabledEmbedder {
    reason: String,
}

impl DisabledEmbedder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextEmbedder for DisabledEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        Err(EmbedderError::Unavailable(self.reason.clone()))
    }

    fn available(&self) -> bool {
        false
    }
}

/// Scale a vector to unit length. Stored embeddings are normalized so cosine
/// similarity reduces to a dot product.
pub fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn disabled_embedder_reports_unavailable() {
        let embedder = DisabledEmbedder::new("model missing");
        assert!(!embedder.available());
        assert!(embedder.embed("anything").is_err());
    }
}
