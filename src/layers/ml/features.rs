//! Feature-based scorer (§4.6, mode 1): always available, no model required.
//!
//! Extracts a fixed feature vector, weights each contribution, discards
//! noise below `MinFeatureContribution`, and squashes the weighted sum
//! into `[0, 1]` via a logistic function.

use super::lexicon;
use std::collections::HashMap;

/// Stable, contractual feature names — used for `FeatureWeights`,
/// `DisabledFeatures`, and `top_features` reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FeatureName {
    ShannonEntropy,
    CompressionRatio,
    ControlCharRatio,
    HighUnicodeRatio,
    ZeroWidthIndicator,
    BidiOverrideIndicator,
    InjectionKeywordCount,
    CommandKeywordCount,
    RoleKeywordCount,
    IgnorePatternHit,
    NewInstructionsHit,
    PersonaSwitchHit,
    SystemPromptReferenceHit,
    CodeIndicator,
    RepeatedDelimiterCount,
    XmlTagCount,
    Base64BlobIndicator,
    TemplatePlaceholderIndicator,
    StructuralComplexity,
}

impl FeatureName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShannonEntropy => "shannon_entropy",
            Self::CompressionRatio => "compression_ratio",
            Self::ControlCharRatio => "control_char_ratio",
            Self::HighUnicodeRatio => "high_unicode_ratio",
            Self::ZeroWidthIndicator => "zero_width_indicator",
            Self::BidiOverrideIndicator => "bidi_override_indicator",
            Self::InjectionKeywordCount => "injection_keyword_count",
            Self::CommandKeywordCount => "command_keyword_count",
            Self::RoleKeywordCount => "role_keyword_count",
            Self::IgnorePatternHit => "ignore_pattern_hit",
            Self::NewInstructionsHit => "new_instructions_hit",
            Self::PersonaSwitchHit => "persona_switch_hit",
            Self::SystemPromptReferenceHit => "system_prompt_reference_hit",
            Self::CodeIndicator => "code_indicator",
            Self::RepeatedDelimiterCount => "repeated_delimiter_count",
            Self::XmlTagCount => "xml_tag_count",
            Self::Base64BlobIndicator => "base64_blob_indicator",
            Self::TemplatePlaceholderIndicator => "template_placeholder_indicator",
            Self::StructuralComplexity => "structural_complexity",
        }
    }

    /// All feature names, in a fixed, contractual order.
    #[must_use]
    pub fn all() -> &'static [FeatureName] {
        use FeatureName::{
            Base64BlobIndicator, BidiOverrideIndicator, CodeIndicator, CommandKeywordCount,
            CompressionRatio, ControlCharRatio, HighUnicodeRatio, IgnorePatternHit,
            InjectionKeywordCount, NewInstructionsHit, PersonaSwitchHit, RepeatedDelimiterCount,
            RoleKeywordCount, ShannonEntropy, StructuralComplexity, SystemPromptReferenceHit,
            TemplatePlaceholderIndicator, XmlTagCount, ZeroWidthIndicator,
        };
        &[
            ShannonEntropy,
            CompressionRatio,
            ControlCharRatio,
            HighUnicodeRatio,
            ZeroWidthIndicator,
            BidiOverrideIndicator,
            InjectionKeywordCount,
            CommandKeywordCount,
            RoleKeywordCount,
            IgnorePatternHit,
            NewInstructionsHit,
            PersonaSwitchHit,
            SystemPromptReferenceHit,
            CodeIndicator,
            RepeatedDelimiterCount,
            XmlTagCount,
            Base64BlobIndicator,
            TemplatePlaceholderIndicator,
            StructuralComplexity,
        ]
    }
}

/// Default per-feature weight table, used where `FeatureWeights` doesn't
/// override a name. Tuned so that a handful of strong signals (ignore
/// patterns, persona switches, command keywords) dominate the squash,
/// while purely structural signals (entropy, compression) nudge the
/// score without single-handedly crossing the default 0.8 threshold.
#[must_use]
pub fn default_weight(name: FeatureName) -> f64 {
    match name {
        FeatureName::ShannonEntropy => 0.15,
        FeatureName::CompressionRatio => 0.15,
        FeatureName::ControlCharRatio => 0.5,
        FeatureName::HighUnicodeRatio => 0.2,
        FeatureName::ZeroWidthIndicator => 0.6,
        FeatureName::BidiOverrideIndicator => 0.6,
        FeatureName::InjectionKeywordCount => 0.35,
        FeatureName::CommandKeywordCount => 0.5,
        FeatureName::RoleKeywordCount => 0.35,
        FeatureName::IgnorePatternHit => 0.8,
        FeatureName::NewInstructionsHit => 0.6,
        FeatureName::PersonaSwitchHit => 0.7,
        FeatureName::SystemPromptReferenceHit => 0.55,
        FeatureName::CodeIndicator => 0.1,
        FeatureName::RepeatedDelimiterCount => 0.4,
        FeatureName::XmlTagCount => 0.2,
        FeatureName::Base64BlobIndicator => 0.3,
        FeatureName::TemplatePlaceholderIndicator => 0.25,
        FeatureName::StructuralComplexity => 0.2,
    }
}

/// A single feature's raw value, weight, and final contribution.
#[derive(Debug, Clone)]
pub struct FeatureContribution {
    pub name: FeatureName,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// The outcome of extracting and weighting a prompt's feature vector.
#[derive(Debug, Clone, Default)]
pub struct FeatureScore {
    pub confidence: f64,
    pub contributions: Vec<FeatureContribution>,
}

/// Extracts the fixed §4.6 feature vector from a prompt and combines it
/// into a `[0, 1]` confidence.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Compute every feature, weight it, drop sub-threshold noise, and
    /// squash the weighted sum into `[0, 1]`.
    #[must_use]
    pub fn score(
        prompt: &str,
        weights: &HashMap<String, f64>,
        disabled: &[String],
        min_contribution: f64,
    ) -> FeatureScore {
        let raw: Vec<(FeatureName, f64)> = FeatureName::all()
            .iter()
            .copied()
            .filter(|n| !disabled.iter().any(|d| d == n.as_str()))
            .map(|n| (n, extract(n, prompt)))
            .collect();

        let mut contributions = Vec::with_capacity(raw.len());
        let mut weighted_sum = 0.0_f64;

        for (name, value) in raw {
            let weight = weights.get(name.as_str()).copied().unwrap_or_else(|| default_weight(name));
            let contribution = value * weight;
            if contribution.abs() < min_contribution {
                continue;
            }
            weighted_sum += contribution;
            contributions.push(FeatureContribution {
                name,
                value,
                weight,
                contribution,
            });
        }

        // Centre the logistic squash so a handful of mid-strength signals
        // (roughly weighted_sum >= 1.0) already cross the midpoint.
        let confidence = squash(weighted_sum - 1.0);

        contributions.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        FeatureScore {
            confidence,
            contributions,
        }
    }
}

/// Logistic squash into `(0, 1)`.
fn squash(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn extract(name: FeatureName, prompt: &str) -> f64 {
    match name {
        FeatureName::ShannonEntropy => shannon_entropy(prompt.as_bytes()) / 8.0,
        FeatureName::CompressionRatio => compression_ratio(prompt.as_bytes()),
        FeatureName::ControlCharRatio => char_ratio(prompt, |c| c.is_control() && c != '\n' && c != '\t'),
        FeatureName::HighUnicodeRatio => char_ratio(prompt, |c| (c as u32) > 0x2000),
        FeatureName::ZeroWidthIndicator => {
            f64::from(u8::from(prompt.chars().any(crate::validator::is_suspicious_codepoint)))
        }
        FeatureName::BidiOverrideIndicator => f64::from(u8::from(
            prompt.chars().any(|c| matches!(c as u32, 0x202A..=0x202E | 0x2066..=0x2069)),
        )),
        FeatureName::InjectionKeywordCount => keyword_density(prompt, lexicon::INJECTION_KEYWORDS),
        FeatureName::CommandKeywordCount => keyword_density(prompt, lexicon::COMMAND_KEYWORDS),
        FeatureName::RoleKeywordCount => keyword_density(prompt, lexicon::ROLE_KEYWORDS),
        FeatureName::IgnorePatternHit => f64::from(u8::from(lexicon::ignore_pattern().is_match(prompt))),
        FeatureName::NewInstructionsHit => {
            f64::from(u8::from(lexicon::new_instructions_pattern().is_match(prompt)))
        }
        FeatureName::PersonaSwitchHit => {
            f64::from(u8::from(lexicon::persona_switch_pattern().is_match(prompt)))
        }
        FeatureName::SystemPromptReferenceHit => {
            f64::from(u8::from(lexicon::system_prompt_reference_pattern().is_match(prompt)))
        }
        FeatureName::CodeIndicator => f64::from(u8::from(lexicon::fenced_code_pattern().is_match(prompt))),
        FeatureName::RepeatedDelimiterCount => {
            (lexicon::repeated_delimiter_pattern().find_iter(prompt).count() as f64 / 3.0).min(1.0)
        }
        FeatureName::XmlTagCount => (lexicon::xml_tag_pattern().find_iter(prompt).count() as f64 / 6.0).min(1.0),
        FeatureName::Base64BlobIndicator => {
            f64::from(u8::from(lexicon::base64_blob_pattern().is_match(prompt)))
        }
        FeatureName::TemplatePlaceholderIndicator => {
            f64::from(u8::from(lexicon::template_placeholder_pattern().is_match(prompt)))
        }
        FeatureName::StructuralComplexity => token_length_variance(prompt),
    }
}

/// Shannon entropy of the byte distribution, used as the feature
/// vector's diversity measure.
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u32; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let len = data.len() as f64;
    let mut entropy = 0.0_f64;
    for &c in &counts {
        if c > 0 {
            let p = f64::from(c) / len;
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Compression ratio (compressed/original) as a diversity proxy: highly
/// repetitive or templated text compresses well (low ratio); natural
/// language sits in the middle; encoded/high-entropy blobs barely
/// compress (ratio near 1). Reported as `1.0 - ratio` so higher means
/// "more suspicious" like the other features.
fn compression_ratio(data: &[u8]) -> f64 {
    if data.len() < 16 {
        return 0.0;
    }
    #[cfg(feature = "ml-features")]
    {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(data).is_err() {
            return 0.0;
        }
        let Ok(compressed) = encoder.finish() else {
            return 0.0;
        };
        let ratio = compressed.len() as f64 / data.len() as f64;
        (1.0 - ratio).clamp(0.0, 1.0)
    }
    #[cfg(not(feature = "ml-features"))]
    {
        0.0
    }
}

fn char_ratio(text: &str, predicate: impl Fn(char) -> bool) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let matched = text.chars().filter(|&c| predicate(c)).count();
    matched as f64 / total as f64
}

fn keyword_density(text: &str, keywords: &[&str]) -> f64 {
    let lower = text.to_lowercase();
    let count: usize = keywords.iter().map(|k| lower.matches(k).count()).sum();
    (count as f64 / 3.0).min(1.0)
}

/// Variance of whitespace-separated token lengths, normalised. Unusually
/// uniform (templated) or unusually scattered token lengths both raise
/// this signal.
fn token_length_variance(text: &str) -> f64 {
    let lengths: Vec<f64> = text.split_whitespace().map(|w| w.chars().count() as f64).collect();
    if lengths.len() < 4 {
        return 0.0;
    }
    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
    (variance / 50.0).min(1.0)
}
