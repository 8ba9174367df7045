//! Neural scorer: optional ONNX-backed classifier.
//!
//! Consumers that don't enable `ml-neural` still compile and link:
//! [`NeuralScorer`] is a plain trait, and [`load_from_path`] is the only
//! function gated behind the feature.

use crate::error::ShieldError;
use async_trait::async_trait;

/// A source of neural threat-probability scores. Implementations own
/// their model weights and tokenizer for the lifetime of the process.
#[async_trait]
pub trait NeuralScorer: Send + Sync {
    /// Tokenise, truncate to `max_sequence_length`, run one inference,
    /// and return the scalar threat probability in `[0, 1]`.
    async fn score(&self, text: &str, max_sequence_length: usize) -> Result<f64, ShieldError>;
}

#[cfg(feature = "ml-neural")]
mod ort_backend {
    use super::{NeuralScorer, ShieldError};
    use async_trait::async_trait;
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;
    use tokenizers::Tokenizer;

    /// Wraps an ONNX Runtime session plus a Hugging Face-style tokenizer.
    ///
    /// `ort::session::Session::run` takes `&mut self`; sessions are not
    /// `Sync` under mutation, so inference is serialised behind a mutex.
    /// `MaxConcurrentInferences` (enforced one layer up by the ML layer's
    /// semaphore) bounds how many callers queue on it at once.
    pub struct OrtNeuralScorer {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
    }

    impl OrtNeuralScorer {
        /// Load a model and its tokenizer from a directory containing
        /// `model.onnx` and `tokenizer.json`.
        ///
        /// # Errors
        ///
        /// Returns [`ShieldError::PatternProviderInit`]-shaped construction
        /// failures wrapped as [`ShieldError::Fatal`] if the model or
        /// tokenizer cannot be loaded.
        pub fn load(model_dir: &Path) -> Result<Self, ShieldError> {
            let session = Session::builder()
                .and_then(|b| b.commit_from_file(model_dir.join("model.onnx")))
                .map_err(|e| ShieldError::Fatal(format!("failed to load ONNX model: {e}")))?;

            let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
                .map_err(|e| ShieldError::Fatal(format!("failed to load tokenizer: {e}")))?;

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }
    }

    #[async_trait]
    impl NeuralScorer for OrtNeuralScorer {
        async fn score(&self, text: &str, max_sequence_length: usize) -> Result<f64, ShieldError> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| ShieldError::Fatal(format!("tokenisation failed: {e}")))?;

            let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
            ids.truncate(max_sequence_length);
            let seq_len = ids.len();

            let input = ndarray::Array2::from_shape_vec((1, seq_len), ids)
                .map_err(|e| ShieldError::Fatal(format!("failed to shape model input: {e}")))?;

            let mut session = self.session.lock().expect("ONNX session mutex poisoned");
            let outputs = session
                .run(ort::inputs![input.view()].map_err(|e| ShieldError::Fatal(e.to_string()))?)
                .map_err(|e| ShieldError::Fatal(format!("inference failed: {e}")))?;

            let (_, scores) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ShieldError::Fatal(format!("failed to extract model output: {e}")))?;

            let probability = scores.first().copied().unwrap_or(0.0);
            Ok(f64::from(probability).clamp(0.0, 1.0))
        }
    }
}

#[cfg(feature = "ml-neural")]
pub use ort_backend::OrtNeuralScorer;

/// Load a neural scorer from the configured model path.
///
/// Returns `Ok(None)` when `ml-neural` isn't compiled in — callers treat
/// this identically to "no model configured" (`model_available: false`
/// in the layer's data payload).
///
/// # Errors
///
/// Returns an error if `ml-neural` is compiled in and the model fails to load.
pub fn load_from_path(
    #[cfg_attr(not(feature = "ml-neural"), allow(unused_variables))] path: &std::path::Path,
) -> Result<Option<std::sync::Arc<dyn NeuralScorer>>, ShieldError> {
    #[cfg(feature = "ml-neural")]
    {
        let scorer = OrtNeuralScorer::load(path)?;
        Ok(Some(std::sync::Arc::new(scorer)))
    }
    #[cfg(not(feature = "ml-neural"))]
    {
        Ok(None)
    }
}
