//! Request Validator (C1): rejects ill-formed prompts, flags suspicious Unicode.
//!
//! This module only detects and reports: it never rewrites or strips the
//! prompt it validates, even when it flags suspicious codepoints.

use serde::{Deserialize, Serialize};

const MAX_REPORTED_CODEPOINTS: usize = 5;

/// A rejection reason. Codes are contractual — match on [`ValidationError::code`]
/// rather than the `Display` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ValidationError {
    PromptRequired,
    PromptTooLong { field: String, max: usize, actual: usize },
    PromptInvalidChars { field: String },
}

impl ValidationError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PromptRequired => "PROMPT_REQUIRED",
            Self::PromptTooLong { .. } => "PROMPT_TOO_LONG",
            Self::PromptInvalidChars { .. } => "PROMPT_INVALID_CHARS",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PromptRequired => write!(f, "[{}] prompt must not be empty", self.code()),
            Self::PromptTooLong { field, max, actual } => write!(
                f,
                "[{}] {field} length {actual} exceeds maximum {max}",
                self.code()
            ),
            Self::PromptInvalidChars { field } => {
                write!(f, "[{}] {field} contains an invalid NUL character", self.code())
            }
        }
    }
}

/// A non-rejecting warning about suspicious Unicode content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub message: String,
    pub codepoints: Vec<u32>,
}

/// The result of validating an [`AnalysisRequest`](crate::model::AnalysisRequest).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// Returns `true` for codepoints commonly abused to evade text filters:
/// zero-width joiners, bidi overrides/isolates, soft hyphen, unusual
/// spaces, and the combining grapheme joiner.
#[must_use]
pub fn is_suspicious_codepoint(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x200B..=0x200D // zero-width space/joiner/non-joiner
        | 0xFEFF // zero-width no-break space / BOM
        | 0x202A..=0x202E // bidi embedding/override
        | 0x2066..=0x2069 // bidi isolates
        | 0x00AD // soft hyphen
        | 0x2000..=0x200A // unusual spaces
        | 0x202F | 0x205F | 0x3000 // narrow no-break space, medium math space, ideographic space
        | 0x034F // combining grapheme joiner
    )
}

/// Stateless validator for [`AnalysisRequest`](crate::model::AnalysisRequest)s.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    max_prompt_length: usize,
}

impl Validator {
    #[must_use]
    pub fn new(max_prompt_length: usize) -> Self {
        Self { max_prompt_length }
    }

    #[must_use]
    pub fn validate(&self, request: &crate::model::AnalysisRequest) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if request.prompt.trim().is_empty() {
            errors.push(ValidationError::PromptRequired);
        }

        self.check_length("prompt", &request.prompt, &mut errors);
        if let Some(system_prompt) = &request.system_prompt {
            self.check_length("system_prompt", system_prompt, &mut errors);
        }

        self.check_nul("prompt", &request.prompt, &mut errors);
        if let Some(system_prompt) = &request.system_prompt {
            self.check_nul("system_prompt", system_prompt, &mut errors);
        }

        if let Some(warning) = scan_suspicious_unicode(&request.prompt) {
            warnings.push(warning);
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn check_length(&self, field: &str, value: &str, errors: &mut Vec<ValidationError>) {
        let actual = value.chars().count();
        if actual > self.max_prompt_length {
            errors.push(ValidationError::PromptTooLong {
                field: field.to_string(),
                max: self.max_prompt_length,
                actual,
            });
        }
    }

    fn check_nul(&self, field: &str, value: &str, errors: &mut Vec<ValidationError>) {
        if value.contains('\0') {
            errors.push(ValidationError::PromptInvalidChars {
                field: field.to_string(),
            });
        }
    }
}

/// Scan for suspicious codepoints, reporting at most the first 5 distinct
/// ones with a "N more" suffix, per §4.1.
#[must_use]
pub fn scan_suspicious_unicode(text: &str) -> Option<ValidationWarning> {
    let mut distinct: Vec<u32> = Vec::new();
    for c in text.chars() {
        if is_suspicious_codepoint(c) {
            let cp = c as u32;
            if !distinct.contains(&cp) {
                distinct.push(cp);
            }
        }
    }

    if distinct.is_empty() {
        return None;
    }

    let reported: Vec<u32> = distinct.iter().take(MAX_REPORTED_CODEPOINTS).copied().collect();
    let remaining = distinct.len().saturating_sub(MAX_REPORTED_CODEPOINTS);
    let hex: Vec<String> = reported.iter().map(|cp| format!("U+{cp:04X}")).collect();
    let message = if remaining > 0 {
        format!(
            "suspicious Unicode detected: {} ({remaining} more)",
            hex.join(", ")
        )
    } else {
        format!("suspicious Unicode detected: {}", hex.join(", "))
    };

    Some(ValidationWarning {
        message,
        codepoints: distinct,
    })
}
