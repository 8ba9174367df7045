//! Pattern Provider Registry (C3): aggregates detection patterns from
//! built-in and custom providers, compiles them with a per-pattern timeout,
//! and supports atomic hot-reload via [`DynamicPatternProvider`].

pub mod builtin;
pub mod registry;

use crate::model::Severity;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub use registry::PatternRegistry;

/// High-level classification of a detection pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PatternCategory {
    /// Attempts to redefine the model's identity or role (jailbreak, persona switch).
    RoleConfusion,
    /// Attempts to override or cancel prior instructions.
    InstructionOverride,
    /// Abuse of delimiters, special tokens, or formatting to inject context.
    DelimiterManipulation,
    /// Attempts to exfiltrate the system prompt or hidden instructions.
    SystemPromptExtraction,
    /// Use of encoding tricks (base64, URL-encoding, Unicode escapes) to
    /// evade literal pattern matching.
    EncodingEvasion,
    /// A single token or short phrase repeated to exhaust context or
    /// dilute safety conditioning.
    ExcessiveRepetition,
    /// Direct solicitation of harmful content, framed as a request the
    /// model should comply with despite its safety policy.
    HarmfulContentSolicitation,
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoleConfusion => write!(f, "role_confusion"),
            Self::InstructionOverride => write!(f, "instruction_override"),
            Self::DelimiterManipulation => write!(f, "delimiter_manipulation"),
            Self::SystemPromptExtraction => write!(f, "system_prompt_extraction"),
            Self::EncodingEvasion => write!(f, "encoding_evasion"),
            Self::ExcessiveRepetition => write!(f, "excessive_repetition"),
            Self::HarmfulContentSolicitation => write!(f, "harmful_content_solicitation"),
        }
    }
}

impl PatternCategory {
    /// The OWASP LLM Top-10 category this pattern category maps to.
    /// All categories currently map to `LLM01` (Prompt Injection).
    #[must_use]
    pub fn owasp_category(self) -> &'static str {
        "LLM01"
    }
}

/// A stable, immutable detection pattern (built-in or custom).
#[derive(Debug, Clone)]
pub struct DetectionPattern {
    pub id: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub regex_source: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub category: PatternCategory,
    pub severity: Severity,
    pub enabled: bool,
}

impl DetectionPattern {
    #[must_use]
    pub fn owasp_category(&self) -> &'static str {
        self.category.owasp_category()
    }
}

/// A user-supplied detection pattern, the serializable counterpart of
/// [`DetectionPattern`] for config-driven custom providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPattern {
    pub id: String,
    pub name: String,
    pub regex_source: String,
    pub description: String,
    pub category: PatternCategory,
    pub severity: Severity,
    #[serde(default = "crate::patterns::default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl From<CustomPattern> for DetectionPattern {
    fn from(p: CustomPattern) -> Self {
        Self {
            id: Cow::Owned(p.id),
            name: Cow::Owned(p.name),
            regex_source: Cow::Owned(p.regex_source),
            description: Cow::Owned(p.description),
            category: p.category,
            severity: p.severity,
            enabled: p.enabled,
        }
    }
}

/// A source of detection patterns. Built-in and custom providers both
/// implement this; the registry iterates them in registration order.
pub trait PatternProvider: Send + Sync {
    /// Stable provider name, used for diagnostics and conflict reporting.
    fn name(&self) -> &str;

    /// The patterns this provider currently contributes.
    fn patterns(&self) -> Vec<DetectionPattern>;
}

/// A [`PatternProvider`] that can refresh its patterns at runtime (e.g.
/// from a remote feed or a watched file). The registry rebuilds its
/// compiled cache atomically after a refresh that reports a change.
#[async_trait::async_trait]
pub trait DynamicPatternProvider: PatternProvider {
    /// Re-fetch patterns from the provider's backing source.
    ///
    /// Returns `Ok(true)` if the pattern set changed (the registry should
    /// rebuild), `Ok(false)` if nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh could not complete (e.g. network
    /// failure). The registry keeps serving the previous cache in this case.
    async fn refresh(&self) -> Result<bool, crate::error::ShieldError>;
}
