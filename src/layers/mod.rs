//! The four content-inspection pipeline layers (L1–L4). L0 (language
//! filter) lives in [`crate::language`] since it wraps an external
//! collaborator rather than inspecting content directly.

pub mod heuristics;
pub mod ml;
pub mod pattern_matching;
pub mod semantic;

pub use heuristics::HeuristicLayer;
pub use ml::MlClassificationLayer;
pub use pattern_matching::PatternMatchingLayer;
pub use semantic::SemanticAnalysisLayer;

/// Check whether `text` matches any of a layer's user-supplied allowlist
/// regexes. Shared by L1/L3/L4 per §4.4/§4.6/§4.7 ("Allowlist: mirrors L1").
#[must_use]
pub fn matches_allowlist(text: &str, allowed_patterns: &[String]) -> bool {
    allowed_patterns.iter().any(|p| {
        regex::Regex::new(p)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    })
}
