//! Configuration for the detection engine.
//!
//! This module provides the configuration infrastructure for `prompt-shield`:
//!
//! - [`EngineConfig`] – top-level configuration tree, composing per-layer configs
//! - [`EngineConfigBuilder`] – builder for constructing a config from files, env vars, and overrides
//! - [`FailMode`] – what to do when the orchestrator itself fails
//!
//! ## Configuration Hierarchy
//!
//! Configuration is resolved in the following order (later wins):
//!
//! 1. Compiled defaults (secure by default)
//! 2. Config file (`prompt-shield.toml`, `.yaml`, or `.json`)
//! 3. Environment variables (`PROMPT_SHIELD_*`)
//! 4. Builder overrides
//!
//! ## Example
//!
//! ```rust,ignore
//! use prompt_shield::config::EngineConfigBuilder;
//!
//! let config = EngineConfigBuilder::new()
//!     .with_file("config/prompt-shield.toml")?
//!     .with_env()
//!     .build()?;
//!
//! assert!(config.pattern_matching.enabled);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

/// Errors that can occur while building an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that failed to read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse configuration
    #[error("failed to parse {format} config: {source}")]
    ParseError {
        /// Format that failed to parse (YAML, TOML, JSON)
        format: String,
        /// Underlying parse error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Unsupported or unrecognised configuration file extension
    #[error("unsupported config file format: {message}")]
    UnsupportedFormat {
        /// Description of the problem
        message: String,
    },

    /// Configuration validation failed
    #[error("config validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Environment variable parsing error
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// Environment variable key
        key: String,
        /// Error message
        message: String,
    },
}

/// Behavior when the orchestrator itself fails (as opposed to a single layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// Block the request; surface a security failure to the caller.
    Closed,
    /// Admit the request with a synthetic safe result; log a warning.
    Open,
}

impl Default for FailMode {
    fn default() -> Self {
        Self::Closed // secure by default
    }
}

/// Coarse dial scaling thresholds/contributions across the heuristic and ML layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
    Paranoid,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::Medium
    }
}

impl Sensitivity {
    /// Multiplier applied to trigger thresholds (and, inversely, to contributions).
    #[must_use]
    pub fn threshold_scale(self) -> f64 {
        match self {
            Self::Low => 1.25,
            Self::Medium => 1.0,
            Self::High => 0.8,
            Self::Paranoid => 0.6,
        }
    }
}

/// Gate action for language-filter and pattern/ML/semantic allowlist decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    Allow,
    AllowWithWarning,
    Block,
}

/// Pattern-matching layer (L1) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PatternMatchingConfig {
    pub enabled: bool,
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub early_exit_threshold: f64,
    pub include_built_in_patterns: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub timeout_contribution: f64,
    pub disabled_pattern_ids: Vec<String>,
    pub allowed_patterns: Vec<String>,
    pub sensitivity: Sensitivity,
}

impl Default for PatternMatchingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 100,
            early_exit_threshold: 0.9,
            include_built_in_patterns: true,
            timeout_contribution: 0.3,
            disabled_pattern_ids: Vec::new(),
            allowed_patterns: Vec::new(),
            sensitivity: Sensitivity::Medium,
        }
    }
}

/// Heuristic layer (L2) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub enabled: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub definitive_threat_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub definitive_safe_threshold: f64,
    pub sensitivity: Sensitivity,
    pub directive_word_threshold: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub punctuation_ratio_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub alphanumeric_ratio_threshold: f64,
    pub allowed_patterns: Vec<String>,
    pub additional_blocked_patterns: Vec<String>,
    pub domain_exclusions: Vec<String>,
    pub use_compound_patterns: bool,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            definitive_threat_threshold: 0.85,
            definitive_safe_threshold: 0.15,
            sensitivity: Sensitivity::Medium,
            directive_word_threshold: 3,
            punctuation_ratio_threshold: 0.15,
            alphanumeric_ratio_threshold: 0.5,
            allowed_patterns: Vec::new(),
            additional_blocked_patterns: Vec::new(),
            domain_exclusions: Vec::new(),
            use_compound_patterns: true,
        }
    }
}

/// ML classification layer (L3) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MlConfig {
    pub enabled: bool,
    pub model_path: Option<PathBuf>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: f64,
    pub max_sequence_length: usize,
    pub max_concurrent_inferences: usize,
    pub inference_timeout_seconds: u64,
    pub use_ensemble: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    pub model_weight: f64,
    pub sensitivity: Sensitivity,
    pub feature_weights: HashMap<String, f64>,
    pub allowed_patterns: Vec<String>,
    pub disabled_features: Vec<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_feature_contribution: f64,
    pub include_feature_importance: bool,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: None,
            threshold: 0.8,
            max_sequence_length: 512,
            max_concurrent_inferences: 4,
            inference_timeout_seconds: 10,
            use_ensemble: true,
            model_weight: 0.7,
            sensitivity: Sensitivity::Medium,
            feature_weights: HashMap::new(),
            allowed_patterns: Vec::new(),
            disabled_features: Vec::new(),
            min_feature_contribution: 0.1,
            include_feature_importance: true,
        }
    }
}

/// Semantic analysis layer (L4) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SemanticAnalysisConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub deployment_name: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: f64,
    pub max_input_length: usize,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub max_concurrent_requests: usize,
    pub rate_limit_tokens: u32,
    pub rate_limit_period_seconds: u64,
    pub max_queued_requests: usize,
    pub custom_system_prompt: Option<String>,
    pub additional_context: Option<String>,
    pub allowed_patterns: Vec<String>,
    pub sensitivity: Sensitivity,
}

impl Default for SemanticAnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            deployment_name: None,
            api_key: None,
            api_version: "2024-08-01-preview".to_string(),
            threshold: 0.7,
            max_input_length: 8000,
            timeout_seconds: 30,
            max_retries: 2,
            retry_base_delay_ms: 500,
            max_concurrent_requests: 5,
            rate_limit_tokens: 10,
            rate_limit_period_seconds: 1,
            max_queued_requests: 5,
            custom_system_prompt: None,
            additional_context: None,
            allowed_patterns: Vec::new(),
            sensitivity: Sensitivity::Medium,
        }
    }
}

/// Language filter layer (L0) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LanguageConfig {
    pub enabled: bool,
    pub supported_languages: Vec<String>,
    pub on_unsupported_language: GateAction,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_detection_confidence: f64,
    pub min_text_length_for_detection: usize,
    pub on_short_text: GateAction,
    pub on_low_confidence_detection: GateAction,
    pub include_language_in_results: bool,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            supported_languages: vec!["en".to_string()],
            on_unsupported_language: GateAction::Block,
            min_detection_confidence: 0.7,
            min_text_length_for_detection: 20,
            on_short_text: GateAction::Allow,
            on_low_confidence_detection: GateAction::Block,
            include_language_in_results: true,
        }
    }
}

/// Weights used to combine executed layers into the final aggregate confidence.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AggregationConfig {
    pub pattern_matching_weight: f64,
    pub heuristics_weight: f64,
    pub ml_classification_weight: f64,
    pub semantic_analysis_weight: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            pattern_matching_weight: 0.4,
            heuristics_weight: 0.6,
            ml_classification_weight: 0.8,
            semantic_analysis_weight: 0.9,
        }
    }
}

/// Top-level engine configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub threat_threshold: f64,
    pub max_prompt_length: usize,
    pub include_breakdown: bool,
    pub on_analysis_error: FailMode,
    pub log_prompt_content: bool,

    #[validate(nested)]
    pub pattern_matching: PatternMatchingConfig,
    #[validate(nested)]
    pub heuristics: HeuristicsConfig,
    #[validate(nested)]
    pub ml: MlConfig,
    #[validate(nested)]
    pub semantic_analysis: SemanticAnalysisConfig,
    #[validate(nested)]
    pub language: LanguageConfig,
    #[validate(nested)]
    pub aggregation: AggregationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threat_threshold: 0.75,
            max_prompt_length: 50_000,
            include_breakdown: true,
            on_analysis_error: FailMode::Closed,
            log_prompt_content: false,
            pattern_matching: PatternMatchingConfig::default(),
            heuristics: HeuristicsConfig::default(),
            ml: MlConfig::default(),
            semantic_analysis: SemanticAnalysisConfig::default(),
            language: LanguageConfig::default(),
            aggregation: AggregationConfig::default(),
        }
    }
}

impl Default for GateAction {
    fn default() -> Self {
        Self::Block
    }
}

/// Builder for constructing an [`EngineConfig`] from files, env vars, and overrides.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    base: EngineConfig,
    use_env: bool,
}

impl EngineConfigBuilder {
    /// Create a new builder seeded with secure defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: EngineConfig::default(),
            use_env: false,
        }
    }

    /// Seed the builder from an explicit config value (e.g. constructed in code).
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.base = config;
        self
    }

    /// Load configuration from a file (YAML, TOML, or JSON), replacing current state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: EngineConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    format: "YAML".to_string(),
                    source: Box::new(e),
                })?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                format: "TOML".to_string(),
                source: Box::new(e),
            })?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                    format: "JSON".to_string(),
                    source: Box::new(e),
                })?
            }
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    message: "file extension must be .yaml, .yml, .toml, or .json".to_string(),
                });
            }
        };

        self.base = config;
        Ok(self)
    }

    /// Enable loading overrides from environment variables.
    ///
    /// Looks for variables prefixed with `PROMPT_SHIELD_`, e.g.:
    /// - `PROMPT_SHIELD_THREAT_THRESHOLD=0.8`
    /// - `PROMPT_SHIELD_ON_ANALYSIS_ERROR=open`
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Build the final, validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails or environment variables are invalid.
    pub fn build(mut self) -> Result<EngineConfig, ConfigError> {
        if self.use_env {
            dotenvy::dotenv().ok();

            if let Ok(v) = std::env::var("PROMPT_SHIELD_THREAT_THRESHOLD") {
                self.base.threat_threshold =
                    v.parse().map_err(|_| ConfigError::EnvParse {
                        key: "PROMPT_SHIELD_THREAT_THRESHOLD".to_string(),
                        message: "must be a float between 0 and 1".to_string(),
                    })?;
            }

            if let Ok(v) = std::env::var("PROMPT_SHIELD_MAX_PROMPT_LENGTH") {
                self.base.max_prompt_length = v.parse().map_err(|_| ConfigError::EnvParse {
                    key: "PROMPT_SHIELD_MAX_PROMPT_LENGTH".to_string(),
                    message: "must be an integer".to_string(),
                })?;
            }

            if let Ok(v) = std::env::var("PROMPT_SHIELD_ON_ANALYSIS_ERROR") {
                self.base.on_analysis_error = match v.to_lowercase().as_str() {
                    "closed" | "fail_closed" => FailMode::Closed,
                    "open" | "fail_open" => FailMode::Open,
                    _ => {
                        return Err(ConfigError::EnvParse {
                            key: "PROMPT_SHIELD_ON_ANALYSIS_ERROR".to_string(),
                            message: "must be 'closed' or 'open'".to_string(),
                        });
                    }
                };
            }

            if let Ok(v) = std::env::var("PROMPT_SHIELD_SEMANTIC_API_KEY") {
                self.base.semantic_analysis.api_key = Some(v);
            }
        }

        self.base.validate()?;
        Ok(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threat_threshold, 0.75);
        assert_eq!(config.max_prompt_length, 50_000);
        assert_eq!(config.on_analysis_error, FailMode::Closed);
    }

    #[test]
    fn builder_with_defaults_builds() {
        let config = EngineConfigBuilder::new().build().unwrap();
        assert!(config.pattern_matching.enabled);
        assert!(config.heuristics.enabled);
        assert!(!config.semantic_analysis.enabled);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.threat_threshold, config.threat_threshold);
        assert_eq!(
            parsed.pattern_matching.timeout_ms,
            config.pattern_matching.timeout_ms
        );
        assert_eq!(parsed.aggregation.heuristics_weight, config.aggregation.heuristics_weight);
    }

    #[test]
    fn fail_mode_serializes_snake_case() {
        let json = serde_json::to_string(&FailMode::Closed).unwrap();
        assert_eq!(json, r#""closed""#);
        let parsed: FailMode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, FailMode::Closed);
    }

    #[test]
    fn sensitivity_scales_thresholds() {
        assert!((Sensitivity::Low.threshold_scale() - 1.25).abs() < f64::EPSILON);
        assert!((Sensitivity::Paranoid.threshold_scale() - 0.6).abs() < f64::EPSILON);
    }
}
