//! Turns an (original, corrected) pair into candidate replacement rules.
//!
//! Two strategies are available. [`DiffStrategy::Positional`] compares words
//! at the same index and is only meaningful when both texts have comparable
//! word counts and order. [`DiffStrategy::Aligned`] computes a Myers word
//! diff and only reports spans that were actually replaced.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::text::{context_around, is_blank, tokenize, Token};

pub const WORD_CONFIDENCE: f64 = 0.8;
pub const PHRASE_CONFIDENCE: f64 = 0.9;
const CONTEXT_WINDOW_CHARS: usize = 60;
const DEFAULT_MAX_PHRASE_WORDS: usize = 6;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternType {
    WordReplacement,
    PhraseReplacement,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::WordReplacement => "word-replacement",
            PatternType::PhraseReplacement => "phrase-replacement",
        }
    }

    /// Word replacement for a single token, phrase replacement otherwise.
    pub fn for_span(from: &str) -> Self {
        if from.split_whitespace().count() > 1 {
            PatternType::PhraseReplacement
        } else {
            PatternType::WordReplacement
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word-replacement" => Ok(PatternType::WordReplacement),
            "phrase-replacement" => Ok(PatternType::PhraseReplacement),
            other => Err(format!("unknown pattern type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCandidate {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl PatternCandidate {
    fn is_malformed(&self) -> bool {
        is_blank(&self.from) || is_blank(&self.to) || self.from == self.to
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategy {
    #[default]
    Positional,
    Aligned,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    strategy: DiffStrategy,
    max_phrase_words: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DiffStrategy::default())
    }
}

impl Extractor {
    pub fn new(strategy: DiffStrategy) -> Self {
        Self {
            strategy,
            max_phrase_words: DEFAULT_MAX_PHRASE_WORDS,
        }
    }

    /// Longest replaced span, in words, the aligned strategy will report.
    pub fn with_max_phrase_words(mut self, max_phrase_words: usize) -> Self {
        self.max_phrase_words = max_phrase_words.max(1);
        self
    }

    pub fn strategy(&self) -> DiffStrategy {
        self.strategy
    }

    pub fn extract(&self, original: &str, corrected: &str) -> Vec<PatternCandidate> {
        let old = tokenize(original);
        let new = tokenize(corrected);
        let raw = match self.strategy {
            DiffStrategy::Positional => positional(original, &old, &new),
            DiffStrategy::Aligned => aligned(original, &old, &new, self.max_phrase_words),
        };

        let mut seen = HashSet::new();
        raw.into_iter()
            .filter(|c| !c.is_malformed())
            .filter(|c| seen.insert((c.from.clone(), c.to.clone())))
            .collect()
    }
}

/// Extract candidates with the default (positional) strategy.
pub fn extract(original: &str, corrected: &str) -> Vec<PatternCandidate> {
    Extractor::default().extract(original, corrected)
}

fn candidate(
    original: &str,
    from_span: &[Token<'_>],
    to_span: &[Token<'_>],
    pattern_type: PatternType,
    confidence: f64,
) -> PatternCandidate {
    let join = |span: &[Token<'_>]| {
        span.iter()
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let context = match (from_span.first(), from_span.last()) {
        (Some(first), Some(last)) => Some(context_around(
            original,
            first.start,
            last.end,
            CONTEXT_WINDOW_CHARS,
        )),
        _ => None,
    };
    PatternCandidate {
        from: join(from_span),
        to: join(to_span),
        pattern_type,
        confidence,
        context,
    }
}

fn positional(original: &str, old: &[Token<'_>], new: &[Token<'_>]) -> Vec<PatternCandidate> {
    let mut out = Vec::new();

    for i in 0..old.len().min(new.len()) {
        if old[i].text != new[i].text {
            out.push(candidate(
                original,
                &old[i..=i],
                &new[i..=i],
                PatternType::WordReplacement,
                WORD_CONFIDENCE,
            ));
        }
    }

    // Two-word windows; the corrected side must have both words.
    for i in 0..old.len().saturating_sub(1) {
        if i + 1 >= new.len() {
            break;
        }
        let old_pair = &old[i..i + 2];
        let new_pair = &new[i..i + 2];
        if old_pair[0].text != new_pair[0].text || old_pair[1].text != new_pair[1].text {
            out.push(candidate(
                original,
                old_pair,
                new_pair,
                PatternType::PhraseReplacement,
                PHRASE_CONFIDENCE,
            ));
        }
    }

    out
}

fn aligned(
    original: &str,
    old: &[Token<'_>],
    new: &[Token<'_>],
    max_phrase_words: usize,
) -> Vec<PatternCandidate> {
    let old_words: Vec<&str> = old.iter().map(|t| t.text).collect();
    let new_words: Vec<&str> = new.iter().map(|t| t.text).collect();

    // Myers may interleave deletes and inserts inside one changed region, so
    // every run of non-equal ops between two equal runs is merged first.
    let mut regions: Vec<(Range<usize>, Range<usize>)> = Vec::new();
    let mut pending: Option<(Range<usize>, Range<usize>)> = None;
    for op in capture_diff_slices(Algorithm::Myers, &old_words, &new_words) {
        if op.tag() == DiffTag::Equal {
            regions.extend(pending.take());
            continue;
        }
        let (old_range, new_range) = (op.old_range(), op.new_range());
        pending = Some(match pending.take() {
            Some((o, n)) => (o.start..old_range.end, n.start..new_range.end),
            None => (old_range, new_range),
        });
    }
    regions.extend(pending);

    let mut out = Vec::new();
    for (old_range, new_range) in regions {
        let (old_len, new_len) = (old_range.len(), new_range.len());
        if old_len == 0 || new_len == 0 {
            continue;
        }
        if old_len > max_phrase_words || new_len > max_phrase_words {
            continue;
        }
        let (pattern_type, confidence) = if old_len == 1 && new_len == 1 {
            (PatternType::WordReplacement, WORD_CONFIDENCE)
        } else {
            (PatternType::PhraseReplacement, PHRASE_CONFIDENCE)
        };
        out.push(candidate(
            original,
            &old[old_range],
            &new[new_range],
            pattern_type,
            confidence,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_type_round_trips_through_str() {
        for t in [PatternType::WordReplacement, PatternType::PhraseReplacement] {
            assert_eq!(t.as_str().parse::<PatternType>().unwrap(), t);
        }
        assert!("sentence".parse::<PatternType>().is_err());
    }

    #[test]
    fn for_span_distinguishes_words_from_phrases() {
        assert_eq!(PatternType::for_span("כדי"), PatternType::WordReplacement);
        assert_eq!(
            PatternType::for_span("על מנת"),
            PatternType::PhraseReplacement
        );
    }

    #[test]
    fn context_window_is_measured_in_chars() {
        let filler = vec!["אחת"; 10].join(" ");
        let original = format!("{filler} רוצה {filler}");
        let corrected = format!("{filler} מעדיף {filler}");
        let candidates = extract(&original, &corrected);
        let word = candidates
            .iter()
            .find(|c| c.pattern_type == PatternType::WordReplacement)
            .expect("word candidate");
        let context = word.context.as_deref().expect("context");
        assert!(context.starts_with("...") && context.ends_with("..."));
        assert_eq!(
            context.trim_matches('.').chars().count(),
            CONTEXT_WINDOW_CHARS
        );
        assert!(context.contains("רוצה"));
    }

    #[test]
    fn positional_ignores_missing_corrected_words() {
        let candidates = extract("אני רוצה ללכת הביתה", "אני מעדיף");
        assert!(candidates
            .iter()
            .all(|c| !c.to.is_empty() && c.to.split_whitespace().count() <= 2));
        assert!(candidates
            .iter()
            .any(|c| c.from == "רוצה" && c.to == "מעדיף"));
    }
}
