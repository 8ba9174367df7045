//! Language Detector (C2) and Language Filter Layer (C4, L0).
//!
//! The detector is a narrow collaborator: the pipeline consumes a
//! [`LanguageDetectionResult`] through the [`LanguageDetector`] trait and
//! never depends on a concrete detection library. [`WhatlangDetector`] is
//! the reference implementation.

pub mod whatlang_detector;

use crate::config::{GateAction, LanguageConfig};
use crate::model::LayerName;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use whatlang_detector::WhatlangDetector;

/// The outcome of detecting a prompt's language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectionResult {
    /// ISO-639-1 code, or `"und"` when undetermined.
    pub code: String,
    /// ISO-15924 script code, or `"Zzzz"` when unknown.
    pub script: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the detector itself considers this result reliable.
    pub reliable: bool,
}

impl LanguageDetectionResult {
    /// The undetermined-language sentinel used for text too short or too
    /// ambiguous to classify.
    #[must_use]
    pub fn undetermined() -> Self {
        Self {
            code: "und".to_string(),
            script: "Zzzz".to_string(),
            confidence: 0.0,
            reliable: false,
        }
    }
}

/// A source of language detection. Implementations are process-wide,
/// stateless w.r.t. any single request.
pub trait LanguageDetector: Send + Sync {
    /// Detect the dominant language of `text`.
    fn detect(&self, text: &str) -> LanguageDetectionResult;
}

/// The Language Filter Layer's verdict: either let the request proceed
/// (with an optional attached warning) or block it outright.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum LanguageGateVerdict {
    /// Proceed to later layers.
    Proceed {
        detection: LanguageDetectionResult,
        warning: Option<String>,
    },
    /// Terminate the pipeline now with a language-filter block.
    Block {
        detection: LanguageDetectionResult,
        reason: String,
    },
}

/// The Language Filter Layer (C4, L0): consults a [`LanguageDetector`] and
/// applies the §4.3 decision table.
pub struct LanguageFilterLayer {
    detector: std::sync::Arc<dyn LanguageDetector>,
}

impl LanguageFilterLayer {
    #[must_use]
    pub fn new(detector: std::sync::Arc<dyn LanguageDetector>) -> Self {
        Self { detector }
    }

    /// Apply the decision table from §4.3. Never panics; always returns a
    /// verdict. Duration is measured by the caller (orchestrator).
    #[must_use]
    pub fn evaluate(&self, text: &str, config: &LanguageConfig) -> LanguageGateVerdict {
        let char_count = text.chars().count();

        if char_count < config.min_text_length_for_detection {
            let detection = LanguageDetectionResult::undetermined();
            return Self::apply_action(config.on_short_text, detection, "text too short to classify reliably");
        }

        let detection = self.detector.detect(text);

        if !detection.reliable || detection.confidence < config.min_detection_confidence {
            return Self::apply_action(
                config.on_low_confidence_detection,
                detection,
                "language detection confidence too low",
            );
        }

        if config.supported_languages.iter().any(|l| l == &detection.code) {
            return LanguageGateVerdict::Proceed {
                detection,
                warning: None,
            };
        }

        Self::apply_action(config.on_unsupported_language, detection, "language not in SupportedLanguages")
    }

    fn apply_action(
        action: GateAction,
        detection: LanguageDetectionResult,
        reason: &str,
    ) -> LanguageGateVerdict {
        match action {
            GateAction::Allow => LanguageGateVerdict::Proceed {
                detection,
                warning: None,
            },
            GateAction::AllowWithWarning => LanguageGateVerdict::Proceed {
                warning: Some(reason.to_string()),
                detection,
            },
            GateAction::Block => LanguageGateVerdict::Block {
                detection,
                reason: reason.to_string(),
            },
        }
    }
}

/// Build the synthetic block [`LayerResult`](crate::model::LayerResult) the
/// orchestrator attaches to a language-filter termination.
#[must_use]
pub fn block_layer_result(detection: &LanguageDetectionResult, reason: &str, duration: Duration) -> crate::model::LayerResult {
    let mut data = serde_json::Map::new();
    data.insert("detected_language".to_string(), serde_json::Value::String(detection.code.clone()));
    data.insert("detected_script".to_string(), serde_json::Value::String(detection.script.clone()));
    data.insert("detection_confidence".to_string(), serde_json::json!(detection.confidence));
    data.insert("reason".to_string(), serde_json::Value::String(reason.to_string()));
    crate::model::LayerResult::executed(LayerName::LanguageFilter, 1.0, true, duration, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedDetector(LanguageDetectionResult);
    impl LanguageDetector for FixedDetector {
        fn detect(&self, _text: &str) -> LanguageDetectionResult {
            self.0.clone()
        }
    }

    fn config() -> LanguageConfig {
        LanguageConfig::default()
    }

    #[test]
    fn short_text_allows_by_default() {
        let layer = LanguageFilterLayer::new(Arc::new(FixedDetector(LanguageDetectionResult::undetermined())));
        let verdict = layer.evaluate("hi", &config());
        assert!(matches!(verdict, LanguageGateVerdict::Proceed { .. }));
    }

    #[test]
    fn supported_language_proceeds() {
        let detection = LanguageDetectionResult {
            code: "en".to_string(),
            script: "Latn".to_string(),
            confidence: 0.95,
            reliable: true,
        };
        let layer = LanguageFilterLayer::new(Arc::new(FixedDetector(detection)));
        let verdict = layer.evaluate(&"word ".repeat(10), &config());
        assert!(matches!(verdict, LanguageGateVerdict::Proceed { warning: None, .. }));
    }

    #[test]
    fn unsupported_language_blocks_by_default() {
        let detection = LanguageDetectionResult {
            code: "ru".to_string(),
            script: "Cyrl".to_string(),
            confidence: 0.95,
            reliable: true,
        };
        let layer = LanguageFilterLayer::new(Arc::new(FixedDetector(detection)));
        let verdict = layer.evaluate(&"слово ".repeat(10), &config());
        assert!(matches!(verdict, LanguageGateVerdict::Block { .. }));
    }

    #[test]
    fn low_confidence_blocks_by_default() {
        let detection = LanguageDetectionResult {
            code: "en".to_string(),
            script: "Latn".to_string(),
            confidence: 0.2,
            reliable: true,
        };
        let layer = LanguageFilterLayer::new(Arc::new(FixedDetector(detection)));
        let verdict = layer.evaluate(&"word ".repeat(10), &config());
        assert!(matches!(verdict, LanguageGateVerdict::Block { .. }));
    }

    #[test]
    fn unreliable_detector_blocks_even_at_high_confidence() {
        let detection = LanguageDetectionResult {
            code: "en".to_string(),
            script: "Latn".to_string(),
            confidence: 0.95,
            reliable: false,
        };
        let layer = LanguageFilterLayer::new(Arc::new(FixedDetector(detection)));
        let verdict = layer.evaluate(&"word ".repeat(10), &config());
        assert!(matches!(verdict, LanguageGateVerdict::Block { .. }));
    }

    #[test]
    fn allow_with_warning_surfaces_reason() {
        let mut cfg = config();
        cfg.on_unsupported_language = GateAction::AllowWithWarning;
        let detection = LanguageDetectionResult {
            code: "fr".to_string(),
            script: "Latn".to_string(),
            confidence: 0.95,
            reliable: true,
        };
        let layer = LanguageFilterLayer::new(Arc::new(FixedDetector(detection)));
        let verdict = layer.evaluate(&"mot ".repeat(10), &cfg);
        match verdict {
            LanguageGateVerdict::Proceed { warning: Some(_), .. } => {}
            other => panic!("expected Proceed with warning, got {other:?}"),
        }
    }
}
