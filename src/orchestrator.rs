//! Pipeline Orchestrator (C9): sequences L0..L4, applies early-exit
//! policies, and aggregates executed layers into a final verdict (§4.8).

use crate::config::EngineConfig;
use crate::language::{LanguageFilterLayer, LanguageGateVerdict};
use crate::layers::heuristics::HeuristicContext;
use crate::layers::{HeuristicLayer, MlClassificationLayer, PatternMatchingLayer, SemanticAnalysisLayer};
use crate::model::{AnalysisRequest, DecisionLayer, DetectionBreakdown, LayerName, LayerResult};
use crate::validator::ValidationReport;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything the facade needs to assemble a final [`AnalysisResult`](crate::model::AnalysisResult).
pub struct OrchestratorOutcome {
    pub breakdown: DetectionBreakdown,
    pub decision_layer: DecisionLayer,
    pub confidence: f64,
    pub is_threat: bool,
    pub owasp_category: Option<String>,
    pub matched_patterns: Vec<String>,
    pub block_reason: Option<String>,
}

/// Sequences the content-inspection layers for one request.
pub struct PipelineOrchestrator {
    language: Option<Arc<LanguageFilterLayer>>,
    pattern_matching: PatternMatchingLayer,
    heuristics: HeuristicLayer,
    ml: MlClassificationLayer,
    semantic: Option<SemanticAnalysisLayer>,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn new(
        language: Option<Arc<LanguageFilterLayer>>,
        pattern_matching: PatternMatchingLayer,
        heuristics: HeuristicLayer,
        ml: MlClassificationLayer,
        semantic: Option<SemanticAnalysisLayer>,
    ) -> Self {
        Self {
            language,
            pattern_matching,
            heuristics,
            ml,
            semantic,
        }
    }

    /// Run the full pipeline against `request`, honoring early exits and
    /// cooperative cancellation.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        validation: &ValidationReport,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> OrchestratorOutcome {
        let mut breakdown = DetectionBreakdown::default();

        if let Some(language) = &self.language {
            if config.language.enabled {
                let start = Instant::now();
                match language.evaluate(&request.prompt, &config.language) {
                    LanguageGateVerdict::Block { detection, reason } => {
                        let result = crate::language::block_layer_result(&detection, &reason, start.elapsed());
                        breakdown.language_filter = Some(result);
                        breakdown.executed_layers.push(LayerName::LanguageFilter);
                        return OrchestratorOutcome {
                            breakdown,
                            decision_layer: DecisionLayer::LanguageFilter,
                            confidence: 1.0,
                            is_threat: true,
                            owasp_category: None,
                            matched_patterns: Vec::new(),
                            block_reason: Some(reason),
                        };
                    }
                    LanguageGateVerdict::Proceed { detection, warning } => {
                        let mut data = serde_json::Map::new();
                        data.insert("detected_language".to_string(), serde_json::Value::String(detection.code.clone()));
                        data.insert("detected_script".to_string(), serde_json::Value::String(detection.script.clone()));
                        data.insert("detection_confidence".to_string(), serde_json::json!(detection.confidence));
                        if let Some(w) = &warning {
                            data.insert("warning".to_string(), serde_json::Value::String(w.clone()));
                        }
                        let result = LayerResult::executed(LayerName::LanguageFilter, 0.0, false, start.elapsed(), data);
                        breakdown.language_filter = Some(result);
                        breakdown.executed_layers.push(LayerName::LanguageFilter);
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return cancelled_outcome(breakdown);
        }

        // L1: Pattern Matching.
        let pattern_result = if config.pattern_matching.enabled {
            let result = self.pattern_matching.run(&request.prompt, &config.pattern_matching).await;
            breakdown.executed_layers.push(LayerName::PatternMatching);
            let confidence = result.confidence.unwrap_or(0.0);
            let is_threat = result.is_threat.unwrap_or(false);
            breakdown.pattern_matching = Some(result.clone());
            if is_threat && confidence >= config.pattern_matching.early_exit_threshold {
                return OrchestratorOutcome {
                    matched_patterns: PatternMatchingLayer::matched_pattern_names(&result),
                    owasp_category: result.data.get("owasp_category").and_then(|v| v.as_str()).map(str::to_string),
                    breakdown,
                    decision_layer: DecisionLayer::Layer(LayerName::PatternMatching),
                    confidence,
                    is_threat: true,
                    block_reason: None,
                };
            }
            Some(result)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return cancelled_outcome(breakdown);
        }

        // L2: Heuristics.
        let default_pattern_result = LayerResult::not_executed(LayerName::PatternMatching);
        let pattern_result_ref = pattern_result.as_ref().unwrap_or(&default_pattern_result);
        let pattern_timed_out = pattern_result_ref.data.get("pattern_timeout").and_then(|v| v.as_bool()).unwrap_or(false);
        let suspicious_codepoints: Vec<u32> = validation.warnings.iter().flat_map(|w| w.codepoints.iter().copied()).collect();

        let heuristics_result = if config.heuristics.enabled {
            let ctx = HeuristicContext {
                prompt: &request.prompt,
                system_prompt: request.system_prompt.as_deref(),
                pattern_result: pattern_result_ref,
                pattern_timed_out,
                suspicious_codepoints: &suspicious_codepoints,
                config: &config.heuristics,
            };
            let result = self.heuristics.run(&ctx);
            breakdown.executed_layers.push(LayerName::Heuristics);
            let confidence = result.confidence.unwrap_or(0.0);
            let is_definitive = result.data.get("is_definitive").and_then(|v| v.as_bool()).unwrap_or(false);
            breakdown.heuristics = Some(result.clone());
            if is_definitive {
                return OrchestratorOutcome {
                    breakdown,
                    decision_layer: DecisionLayer::Layer(LayerName::Heuristics),
                    confidence,
                    is_threat: confidence >= config.heuristics.definitive_threat_threshold,
                    owasp_category: None,
                    matched_patterns: Vec::new(),
                    block_reason: None,
                };
            }
            Some(result)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return cancelled_outcome(breakdown);
        }

        // L3: ML Classification, gated to avoid spending inference budget
        // on prompts L1/L2 already found clearly benign.
        let l1_confidence = pattern_result.as_ref().and_then(|r| r.confidence).unwrap_or(0.0);
        let l2_confidence = heuristics_result.as_ref().and_then(|r| r.confidence).unwrap_or(0.0);
        let ml_gate = (l1_confidence + l2_confidence) / 2.0 >= config.ml.threshold * 0.5;

        let ml_result = if config.ml.enabled && ml_gate {
            let result = self.ml.run(&request.prompt, &config.ml).await;
            breakdown.executed_layers.push(LayerName::MlClassification);
            let confidence = result.confidence.unwrap_or(0.0);
            let is_threat = result.is_threat.unwrap_or(false);
            breakdown.ml_classification = Some(result.clone());
            if is_threat && confidence >= config.ml.threshold {
                return OrchestratorOutcome {
                    breakdown,
                    decision_layer: DecisionLayer::Layer(LayerName::MlClassification),
                    confidence,
                    is_threat: true,
                    owasp_category: None,
                    matched_patterns: Vec::new(),
                    block_reason: None,
                };
            }
            Some(result)
        } else {
            None
        };

        if cancel.is_cancelled() {
            return cancelled_outcome(breakdown);
        }

        // L4: Semantic Analysis, opt-in only — never runs unless both
        // configured and enabled (§4.8: "reference implementation leaves
        // L4 opt-in only").
        let semantic_result = if config.semantic_analysis.enabled {
            if let Some(semantic) = &self.semantic {
                let result = semantic.run(&request.prompt, &config.semantic_analysis, cancel).await;
                breakdown.executed_layers.push(LayerName::SemanticAnalysis);
                breakdown.semantic_analysis = Some(result.clone());
                Some(result)
            } else {
                None
            }
        } else {
            None
        };

        let executed: Vec<(f64, f64)> = [
            pattern_result.as_ref().map(|r| (r.confidence.unwrap_or(0.0), config.aggregation.pattern_matching_weight)),
            heuristics_result.as_ref().map(|r| (r.confidence.unwrap_or(0.0), config.aggregation.heuristics_weight)),
            ml_result.as_ref().map(|r| (r.confidence.unwrap_or(0.0), config.aggregation.ml_classification_weight)),
            semantic_result.as_ref().map(|r| (r.confidence.unwrap_or(0.0), config.aggregation.semantic_analysis_weight)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let weight_sum: f64 = executed.iter().map(|(_, w)| w).sum();
        let aggregate = if weight_sum > 0.0 {
            executed.iter().map(|(c, w)| c * w).sum::<f64>() / weight_sum
        } else {
            0.0
        }
        .clamp(0.0, 1.0);

        let is_threat = aggregate >= config.threat_threshold;
        let matched_patterns = pattern_result.as_ref().map(PatternMatchingLayer::matched_pattern_names).unwrap_or_default();
        let owasp_category = pattern_result
            .as_ref()
            .and_then(|r| r.data.get("owasp_category"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        OrchestratorOutcome {
            breakdown,
            decision_layer: DecisionLayer::Aggregated,
            confidence: aggregate,
            is_threat,
            owasp_category,
            matched_patterns,
            block_reason: None,
        }
    }
}

fn cancelled_outcome(breakdown: DetectionBreakdown) -> OrchestratorOutcome {
    OrchestratorOutcome {
        breakdown,
        decision_layer: DecisionLayer::Aggregated,
        confidence: 0.0,
        is_threat: false,
        owasp_category: None,
        matched_patterns: Vec::new(),
        block_reason: Some("cancelled".to_string()),
    }
}
