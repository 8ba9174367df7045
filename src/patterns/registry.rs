//! Compiles and caches patterns contributed by one or more [`PatternProvider`]s,
//! evaluating them with a hard per-pattern timeout (ReDoS guard) and
//! supporting atomic hot-reload via [`DynamicPatternProvider`].

use super::{DetectionPattern, PatternProvider};
use crate::error::ShieldError;
use arc_swap::ArcSwap;
use regex::{Regex, RegexSet};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A pattern plus its compiled regex, held in the atomic cache.
struct CompiledPattern {
    pattern: DetectionPattern,
    regex: Regex,
}

/// The immutable, swappable compiled state. Readers hold an `Arc` to one
/// snapshot for the duration of an evaluation; a rebuild never mutates it
/// in place.
struct CompiledPatternSet {
    set: RegexSet,
    compiled: Vec<CompiledPattern>,
}

impl CompiledPatternSet {
    fn build(patterns: &[DetectionPattern]) -> Result<Self, ShieldError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for p in patterns {
            let regex = Regex::new(&p.regex_source).map_err(|e| {
                ShieldError::PatternProviderInit(format!(
                    "pattern '{}' failed to compile: {e}",
                    p.id
                ))
            })?;
            compiled.push(CompiledPattern {
                pattern: p.clone(),
                regex,
            });
        }
        let set = RegexSet::new(compiled.iter().map(|c| c.regex.as_str())).map_err(|e| {
            ShieldError::PatternProviderInit(format!("failed to build pattern set: {e}"))
        })?;
        Ok(Self { set, compiled })
    }
}

/// A single matched pattern, surfaced to the Pattern Matching Layer.
#[derive(Debug, Clone)]
pub struct PatternMatchOutcome {
    pub id: String,
    pub name: String,
    pub category: super::PatternCategory,
    pub severity: crate::model::Severity,
}

/// The outcome of evaluating the compiled pattern set against a prompt.
#[derive(Debug, Clone, Default)]
pub struct PatternEvalResult {
    pub matches: Vec<PatternMatchOutcome>,
    pub timed_out: bool,
}

/// Aggregates patterns from zero or more providers into a single compiled,
/// hot-swappable cache.
pub struct PatternRegistry {
    providers: Vec<Arc<dyn PatternProvider>>,
    disabled_ids: HashSet<String>,
    per_pattern_timeout: Duration,
    cache: ArcSwap<CompiledPatternSet>,
}

impl PatternRegistry {
    /// Build a registry from the given providers, compiling all enabled,
    /// non-disabled patterns up front.
    ///
    /// # Errors
    ///
    /// Returns [`ShieldError::PatternProviderInit`] if any enabled pattern
    /// fails to compile.
    pub fn build(
        providers: Vec<Arc<dyn PatternProvider>>,
        disabled_ids: impl IntoIterator<Item = String>,
        per_pattern_timeout: Duration,
    ) -> Result<Self, ShieldError> {
        let disabled_ids: HashSet<String> = disabled_ids.into_iter().collect();
        let patterns = Self::collect_enabled(&providers, &disabled_ids);
        let initial = CompiledPatternSet::build(&patterns)?;
        Ok(Self {
            providers,
            disabled_ids,
            per_pattern_timeout,
            cache: ArcSwap::new(Arc::new(initial)),
        })
    }

    fn collect_enabled(
        providers: &[Arc<dyn PatternProvider>],
        disabled_ids: &HashSet<String>,
    ) -> Vec<DetectionPattern> {
        providers
            .iter()
            .flat_map(|p| p.patterns())
            .filter(|p| p.enabled && !disabled_ids.contains(p.id.as_ref()))
            .collect()
    }

    /// Rebuild the compiled cache from the current provider set and swap it
    /// in atomically. In-flight evaluations continue against the snapshot
    /// they already hold.
    ///
    /// # Errors
    ///
    /// Returns [`ShieldError::PatternProviderInit`] if recompilation fails;
    /// the previous cache remains in effect.
    pub fn rebuild(&self) -> Result<(), ShieldError> {
        let patterns = Self::collect_enabled(&self.providers, &self.disabled_ids);
        let next = CompiledPatternSet::build(&patterns)?;
        self.cache.store(Arc::new(next));
        Ok(())
    }

    /// Number of compiled patterns currently active.
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.cache.load().compiled.len()
    }

    /// Evaluate every compiled pattern against `text`.
    ///
    /// Uses a two-pass strategy: a single [`RegexSet`] scan to find
    /// candidate indices cheaply, then a per-candidate [`Regex::find`] only
    /// on those indices, each bounded by `per_pattern_timeout` by running it
    /// on a blocking task. A pattern that times out is skipped and
    /// `timed_out` is set.
    pub async fn evaluate(&self, text: &str) -> PatternEvalResult {
        let snapshot = self.cache.load_full();
        if snapshot.compiled.is_empty() {
            return PatternEvalResult::default();
        }

        let candidate_indices: Vec<usize> = snapshot.set.matches(text).into_iter().collect();
        let mut matches = Vec::new();
        let mut timed_out = false;

        for idx in candidate_indices {
            let compiled = &snapshot.compiled[idx];
            let regex = compiled.regex.clone();
            let owned_text = text.to_string();
            let find = tokio::task::spawn_blocking(move || regex.find(&owned_text).is_some());

            match tokio::time::timeout(self.per_pattern_timeout, find).await {
                Ok(Ok(true)) => matches.push(PatternMatchOutcome {
                    id: compiled.pattern.id.to_string(),
                    name: compiled.pattern.name.to_string(),
                    category: compiled.pattern.category,
                    severity: compiled.pattern.severity,
                }),
                Ok(Ok(false)) => {}
                Ok(Err(_join_error)) => {}
                Err(_elapsed) => timed_out = true,
            }
        }

        PatternEvalResult { matches, timed_out }
    }
}
