//! Crate-wide error type.
//!
//! Per the error handling design, most failures never reach the facade:
//! layers encode recoverable failures into their [`LayerResult`](crate::model::LayerResult)
//! payload instead of propagating an error. Only input validation,
//! construction-time failures, cancellation, and catastrophic orchestrator
//! failures surface as a [`ShieldError`].

use crate::validator::ValidationReport;
use thiserror::Error;

/// Errors returned by the top-level [`PromptShield`](crate::facade::PromptShield) API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShieldError {
    /// The request failed validation (C1). Carries the full report so
    /// callers can inspect individual error codes.
    #[error("request failed validation: {0}")]
    Validation(ValidationReport),

    /// A pattern failed to compile when the registry was built.
    #[error("pattern provider initialisation failed: {0}")]
    PatternProviderInit(String),

    /// The analysis was cancelled. Never masked by fail-open.
    #[error("analysis cancelled")]
    Cancelled,

    /// The orchestrator failed unexpectedly and `OnAnalysisError = FailClosed`.
    #[error("analysis failed: {0}")]
    Fatal(String),
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}
