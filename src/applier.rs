use serde::Serialize;

use crate::store::LearnedPattern;

/// Patterns below this confidence are never applied automatically.
pub const DEFAULT_APPLY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedPattern {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub corrected_text: String,
    pub applied_patterns: Vec<AppliedPattern>,
}

impl ApplyOutcome {
    pub fn unchanged(text: &str) -> Self {
        Self {
            corrected_text: text.to_string(),
            applied_patterns: Vec::new(),
        }
    }
}

/// Rewrites text with learned patterns.
#[derive(Debug, Clone, Copy)]
pub struct Applier {
    threshold: f64,
}

impl Default for Applier {
    fn default() -> Self {
        Self::new(DEFAULT_APPLY_THRESHOLD)
    }
}

impl Applier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Apply every pattern at or above the threshold, most confident first
    /// and longest `from` first among equals. Each pattern rewrites the text
    /// left by the previous ones. Replacement is literal, never a regex.
    pub fn apply(&self, text: &str, patterns: &[LearnedPattern]) -> ApplyOutcome {
        let mut ranked: Vec<&LearnedPattern> = patterns
            .iter()
            .filter(|p| p.confidence >= self.threshold && !p.from.is_empty())
            .collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.from.chars().count().cmp(&a.from.chars().count()))
        });

        let mut corrected = text.to_string();
        let mut applied = Vec::new();
        for pattern in ranked {
            if !corrected.contains(pattern.from.as_str()) {
                continue;
            }
            corrected = corrected.replace(pattern.from.as_str(), &pattern.to);
            log::debug!("Applied pattern '{}' -> '{}'", pattern.from, pattern.to);
            applied.push(AppliedPattern {
                from: pattern.from.clone(),
                to: pattern.to.clone(),
            });
        }

        ApplyOutcome {
            corrected_text: corrected,
            applied_patterns: applied,
        }
    }
}

/// Apply `patterns` with the default threshold.
pub fn apply(text: &str, patterns: &[LearnedPattern]) -> ApplyOutcome {
    Applier::default().apply(text, patterns)
}
