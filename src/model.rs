//! Core data model: requests, per-layer results, and the final verdict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Role of a message in a conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single turn in the conversation history attached to an [`AnalysisRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Free-form request metadata, not interpreted by the pipeline itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub source: Option<String>,
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// The input to an analysis. Immutable for the lifetime of the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl AnalysisRequest {
    /// Construct a request from a bare prompt, per the §6 convenience entry point.
    #[must_use]
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            messages: Vec::new(),
            metadata: RequestMetadata::default(),
        }
    }
}

/// Stable, contractual names of pipeline layers. Used for `ExecutedLayers`
/// and `DecisionLayer` reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    LanguageFilter,
    PatternMatching,
    Heuristics,
    MlClassification,
    SemanticAnalysis,
}

impl LayerName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LanguageFilter => "LanguageFilter",
            Self::PatternMatching => "PatternMatching",
            Self::Heuristics => "Heuristics",
            Self::MlClassification => "MLClassification",
            Self::SemanticAnalysis => "SemanticAnalysis",
        }
    }
}

/// The label attached to the final result describing which layer (or
/// aggregation rule) produced the decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DecisionLayer {
    Layer(LayerName),
    Aggregated,
    LanguageFilter,
    FailOpen,
}

impl std::fmt::Display for DecisionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Layer(name) => write!(f, "{}", name.as_str()),
            Self::Aggregated => write!(f, "Aggregated"),
            Self::LanguageFilter => write!(f, "LanguageFilter"),
            Self::FailOpen => write!(f, "FailOpen"),
        }
    }
}

/// Severity derived monotonically from confidence.
///
/// Ordered lowest-to-highest so `severity >= Severity::High` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Derive severity from a final confidence value per the fixed thresholds.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::Critical
        } else if confidence >= 0.8 {
            Self::High
        } else if confidence >= 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// The confidence a matched pattern/signal of this severity contributes,
    /// per §4.4's `severity.ToConfidence()` rule. Shared by L1/L2/L3.
    #[must_use]
    pub fn to_confidence(self) -> f64 {
        match self {
            Self::Critical => 0.95,
            Self::High => 0.85,
            Self::Medium => 0.7,
            Self::Low => 0.5,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// The outcome of a single pipeline layer.
///
/// Produced exactly once per layer run and never mutated afterward. The
/// `data` map carries layer-specific signals (matched pattern ids, feature
/// contributions, an `error`/`timeout`/`rate_limited` marker, etc.) — its
/// shape is genuinely heterogeneous per layer, so a JSON map is used rather
/// than a typed struct per layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer: LayerName,
    pub executed: bool,
    pub confidence: Option<f64>,
    pub is_threat: Option<bool>,
    pub duration: Option<Duration>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl LayerResult {
    #[must_use]
    pub fn not_executed(layer: LayerName) -> Self {
        Self {
            layer,
            executed: false,
            confidence: None,
            is_threat: None,
            duration: None,
            data: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn executed(
        layer: LayerName,
        confidence: f64,
        is_threat: bool,
        duration: Duration,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            layer,
            executed: true,
            confidence: Some(confidence.clamp(0.0, 1.0)),
            is_threat: Some(is_threat),
            duration: Some(duration),
            data,
        }
    }

    /// Construct the "layer threw" shape the orchestrator uses: executed,
    /// zero confidence, not a threat, with an `error` marker. Per the
    /// resolved Open Question, this still contributes to the aggregation
    /// denominator, pulling the mean toward safe.
    #[must_use]
    pub fn errored(layer: LayerName, duration: Duration, message: impl Into<String>) -> Self {
        let mut data = serde_json::Map::new();
        data.insert("error".to_string(), serde_json::Value::String(message.into()));
        Self {
            layer,
            executed: true,
            confidence: Some(0.0),
            is_threat: Some(false),
            duration: Some(duration),
            data,
        }
    }
}

/// The five per-layer results (some may be absent) plus the ordered list of
/// layers that actually ran.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionBreakdown {
    pub language_filter: Option<LayerResult>,
    pub pattern_matching: Option<LayerResult>,
    pub heuristics: Option<LayerResult>,
    pub ml_classification: Option<LayerResult>,
    pub semantic_analysis: Option<LayerResult>,
    pub executed_layers: Vec<LayerName>,
}

/// Detail about a detected threat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatInfo {
    pub owasp_category: String,
    pub threat_type: String,
    pub explanation: String,
    pub safe_message: String,
    pub severity: Severity,
    pub detection_sources: Vec<String>,
    #[serde(default)]
    pub matched_patterns: Vec<String>,
}

impl ThreatInfo {
    /// The sanitised, end-user-facing message every threat carries.
    #[must_use]
    pub fn default_safe_message() -> String {
        "Your request could not be processed due to security concerns. \
         Please rephrase your request."
            .to_string()
    }
}

/// The final verdict returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    pub is_threat: bool,
    pub confidence: f64,
    pub threat_info: Option<ThreatInfo>,
    pub breakdown: Option<DetectionBreakdown>,
    pub decision_layer: DecisionLayer,
    pub duration: Duration,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_thresholds() {
        assert_eq!(Severity::from_confidence(0.95), Severity::Critical);
        assert_eq!(Severity::from_confidence(0.9), Severity::Critical);
        assert_eq!(Severity::from_confidence(0.85), Severity::High);
        assert_eq!(Severity::from_confidence(0.65), Severity::Medium);
        assert_eq!(Severity::from_confidence(0.1), Severity::Low);
    }

    #[test]
    fn severity_to_confidence_table() {
        assert!((Severity::Critical.to_confidence() - 0.95).abs() < f64::EPSILON);
        assert!((Severity::High.to_confidence() - 0.85).abs() < f64::EPSILON);
        assert!((Severity::Medium.to_confidence() - 0.7).abs() < f64::EPSILON);
        assert!((Severity::Low.to_confidence() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn errored_layer_result_contributes_zero() {
        let r = LayerResult::errored(LayerName::Heuristics, Duration::from_millis(5), "boom");
        assert!(r.executed);
        assert_eq!(r.confidence, Some(0.0));
        assert_eq!(r.is_threat, Some(false));
        assert!(r.data.contains_key("error"));
    }

    #[test]
    fn from_prompt_builds_minimal_request() {
        let req = AnalysisRequest::from_prompt("hello");
        assert_eq!(req.prompt, "hello");
        assert!(req.system_prompt.is_none());
        assert!(req.messages.is_empty());
    }
}
