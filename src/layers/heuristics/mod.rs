//! Heuristic Layer (C6, L2).
//!
//! Runs all registered [`HeuristicAnalyzer`]s against a [`HeuristicContext`],
//! aggregates their scores by arithmetic mean (§4.5's reference rule), and
//! flags a result as *definitive* — triggering orchestrator early exit —
//! when the aggregate sits outside the configured thresholds.

pub mod analyzers;

use crate::config::{HeuristicsConfig, Sensitivity};
use crate::model::{LayerName, LayerResult};
use serde_json::json;
use std::time::Instant;

pub use analyzers::{
    AnomalousStructureAnalyzer, DelimiterInjectionAnalyzer, EncodingPatternsAnalyzer,
    ExcessiveLengthAnalyzer, InstructionLanguageAnalyzer, PropagatedSignalsAnalyzer,
    RepetitivePatternsAnalyzer, RoleSwitchingAnalyzer, SpecialCharRatioAnalyzer,
};

/// A single named signal an analyzer contributes to the aggregate.
#[derive(Debug, Clone)]
pub struct HeuristicSignal {
    pub name: String,
    pub contribution: f64,
    pub description: String,
}

/// The per-analyzer outcome: a score in `[0, 1]`, the signals that produced
/// it, and an optional human-readable explanation.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOutcome {
    pub score: f64,
    pub signals: Vec<HeuristicSignal>,
    pub explanation: Option<String>,
}

/// The input every [`HeuristicAnalyzer`] receives: the prompt, optional
/// system prompt, the L1 pattern-matching result, propagated
/// validator/L1 flags, and the active configuration.
pub struct HeuristicContext<'a> {
    pub prompt: &'a str,
    pub system_prompt: Option<&'a str>,
    pub pattern_result: &'a LayerResult,
    pub pattern_timed_out: bool,
    pub suspicious_codepoints: &'a [u32],
    pub config: &'a HeuristicsConfig,
}

impl HeuristicContext<'_> {
    /// Threshold scaled by the configured [`Sensitivity`] dial.
    #[must_use]
    pub fn scaled_threshold(&self, base: f64) -> f64 {
        base * self.config.sensitivity.threshold_scale()
    }
}

/// A pluggable analyzer contributing one or more named signals. Analyzers
/// run sequentially in registration order (§5: "heuristic analyzers within
/// L2 run sequentially in registration order; their produced signals
/// preserve that ordering").
pub trait HeuristicAnalyzer: Send + Sync {
    /// Stable, contractual analyzer name.
    fn name(&self) -> &str;

    /// Weight this analyzer's score carries in a weighted-mean refinement.
    /// The reference aggregation (§4.5) is an unweighted arithmetic mean;
    /// `weight` is exposed so a host can opt into weighting without
    /// changing the trait.
    fn weight(&self) -> f64 {
        1.0
    }

    /// Score `ctx` and report the signals that produced the score.
    fn analyze(&self, ctx: &HeuristicContext<'_>) -> AnalyzerOutcome;
}

/// The Heuristic Layer (C6, L2).
pub struct HeuristicLayer {
    analyzers: Vec<Box<dyn HeuristicAnalyzer>>,
}

impl HeuristicLayer {
    #[must_use]
    pub fn new(analyzers: Vec<Box<dyn HeuristicAnalyzer>>) -> Self {
        Self { analyzers }
    }

    /// Build the layer with the full built-in analyzer set, in a fixed,
    /// contractual registration order.
    #[must_use]
    pub fn with_builtin_analyzers() -> Self {
        Self::new(vec![
            Box::new(SpecialCharRatioAnalyzer),
            Box::new(InstructionLanguageAnalyzer),
            Box::new(RoleSwitchingAnalyzer),
            Box::new(EncodingPatternsAnalyzer),
            Box::new(DelimiterInjectionAnalyzer),
            Box::new(AnomalousStructureAnalyzer),
            Box::new(RepetitivePatternsAnalyzer),
            Box::new(ExcessiveLengthAnalyzer),
            Box::new(PropagatedSignalsAnalyzer),
        ])
    }

    #[must_use]
    pub fn analyzer_count(&self) -> usize {
        self.analyzers.len()
    }

    /// Unwrap the layer back into its analyzer list, so a builder can
    /// splice in additional analyzers before reassembling the layer.
    #[must_use]
    pub fn into_analyzers(self) -> Vec<Box<dyn HeuristicAnalyzer>> {
        self.analyzers
    }

    pub fn run(&self, ctx: &HeuristicContext<'_>) -> LayerResult {
        let start = Instant::now();

        let mut all_signals: Vec<HeuristicSignal> = Vec::new();
        let mut scores = Vec::with_capacity(self.analyzers.len());

        for analyzer in &self.analyzers {
            let outcome = analyzer.analyze(ctx);
            scores.push(outcome.score.clamp(0.0, 1.0));
            all_signals.extend(outcome.signals);
        }

        let aggregate = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
        .clamp(0.0, 1.0);

        let is_threat = aggregate >= 0.5;
        let is_definitive = aggregate >= ctx.config.definitive_threat_threshold
            || aggregate <= ctx.config.definitive_safe_threshold;

        let mut top_signals = all_signals.clone();
        top_signals.sort_by(|a, b| b.contribution.partial_cmp(&a.contribution).unwrap_or(std::cmp::Ordering::Equal));
        top_signals.truncate(5);

        let mut data = serde_json::Map::new();
        data.insert("signal_count".to_string(), json!(all_signals.len()));
        data.insert("analyzer_count".to_string(), json!(self.analyzers.len()));
        data.insert("is_definitive".to_string(), json!(is_definitive));
        data.insert(
            "top_signals".to_string(),
            serde_json::Value::Array(
                top_signals
                    .iter()
                    .map(|s| json!({"name": s.name, "contribution": s.contribution, "description": s.description}))
                    .collect(),
            ),
        );
        if is_definitive {
            let reason = if aggregate >= ctx.config.definitive_threat_threshold {
                "definitive_threat"
            } else {
                "definitive_safe"
            };
            data.insert("early_exit_reason".to_string(), json!(reason));
        }

        LayerResult::executed(LayerName::Heuristics, aggregate, is_threat, start.elapsed(), data)
    }
}

/// Sensitivity-scaled contribution helper: `value` relative to a
/// sensitivity-scaled `base_threshold`, capped at 1.0 and scaled by
/// `weight`. Shared by analyzers whose signal fires once a measured
/// quantity crosses a scaled threshold.
#[must_use]
pub fn threshold_contribution(value: f64, base_threshold: f64, sensitivity: Sensitivity, weight: f64) -> f64 {
    let scaled = (base_threshold * sensitivity.threshold_scale()).max(f64::EPSILON);
    (value / scaled * weight).min(1.0).max(0.0)
}
