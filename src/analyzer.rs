use std::collections::BTreeMap;

use serde::Serialize;

use crate::corpus::{Category, Rule, RuleCorpus, BUILTIN_CORPUS};
use crate::text::char_offset;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub category: Category,
    #[serde(rename = "original")]
    pub original_span: String,
    pub suggestion: String,
    pub confidence: f64,
    pub explanation: String,
    /// Char offset of the first matched char.
    pub start_index: usize,
    /// Char offset one past the last matched char.
    pub end_index: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub issues: Vec<Issue>,
    pub score: u32,
    pub suggestions: Vec<String>,
    pub counts: BTreeMap<Category, usize>,
    pub total_penalty: u32,
}

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

struct Hyperparameters {
    score_max: u32,
    heavy_literal_min: usize,
    heavy_literal_penalty: u32,
    heavy_literal_confidence: f64,
    anglicism_advice_above: usize,
    literal_advice_above: usize,
    word_order_advice_above: usize,
}

static HP: Hyperparameters = Hyperparameters {
    score_max: 100,
    heavy_literal_min: 3,
    heavy_literal_penalty: 20,
    heavy_literal_confidence: 0.9,
    anglicism_advice_above: 2,
    literal_advice_above: 2,
    word_order_advice_above: 1,
};

pub const SUCCESS_MESSAGE: &str = "הטקסט נשמע טבעי ותקין";
pub const MINOR_POLISH_MESSAGE: &str = "טקסט טוב, נדרש ליטוש קל בלבד";
pub const ANGLICISM_MESSAGE: &str = "יש בטקסט מילים לועזיות רבות; נסו להחליף אותן במילים עבריות";
pub const LITERAL_TRANSLATION_MESSAGE: &str =
    "חלקים מהטקסט נשמעים כמו תרגום ישיר; נסחו אותם מחדש בעברית טבעית";
pub const WORD_ORDER_MESSAGE: &str = "שימו לב לסדר המילים במשפטים";
pub const HEAVY_PATTERNING_EXPLANATION: &str =
    "הטקסט מציג דפוסים רבים של תרגום מכונה או כתיבה אוטומטית";
const HEAVY_PATTERNING_SUGGESTION: &str = "כדאי לנסח מחדש את הקטע כולו";

// ---------------------------------------------------------------------------
// Rule passes
// ---------------------------------------------------------------------------

struct RuleOutput {
    issues: Vec<Issue>,
    penalty: u32,
}

fn run_rule(rule: &Rule, text: &str) -> RuleOutput {
    let mut out = RuleOutput {
        issues: Vec::new(),
        penalty: 0,
    };
    for m in rule.matcher.find_iter(text) {
        out.issues.push(Issue {
            category: rule.category,
            original_span: m.as_str().to_string(),
            suggestion: rule.suggestion.clone(),
            confidence: rule.confidence,
            explanation: rule.explanation.clone(),
            start_index: char_offset(text, m.start()),
            end_index: char_offset(text, m.end()),
        });
        out.penalty += rule.weight;
    }
    out
}

fn merge_output(
    issues: &mut Vec<Issue>,
    penalty: &mut u32,
    counts: &mut BTreeMap<Category, usize>,
    out: RuleOutput,
) {
    for issue in &out.issues {
        *counts.entry(issue.category).or_insert(0) += 1;
    }
    issues.extend(out.issues);
    *penalty += out.penalty;
}

fn initial_counts() -> BTreeMap<Category, usize> {
    Category::ALL.iter().map(|c| (*c, 0)).collect()
}

fn build_suggestions(counts: &BTreeMap<Category, usize>, issue_count: usize) -> Vec<String> {
    if issue_count == 0 {
        return vec![SUCCESS_MESSAGE.to_string()];
    }
    let count = |c: Category| counts.get(&c).copied().unwrap_or(0);

    let mut suggestions = Vec::new();
    if count(Category::Anglicism) > HP.anglicism_advice_above {
        suggestions.push(ANGLICISM_MESSAGE.to_string());
    }
    if count(Category::LiteralTranslation) > HP.literal_advice_above {
        suggestions.push(LITERAL_TRANSLATION_MESSAGE.to_string());
    }
    if count(Category::WordOrder) > HP.word_order_advice_above {
        suggestions.push(WORD_ORDER_MESSAGE.to_string());
    }
    if suggestions.is_empty() {
        suggestions.push(MINOR_POLISH_MESSAGE.to_string());
    }
    suggestions
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scores text against a [`RuleCorpus`].
#[derive(Debug, Clone)]
pub struct Analyzer {
    corpus: RuleCorpus,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(RuleCorpus::builtin())
    }
}

impl Analyzer {
    pub fn new(corpus: RuleCorpus) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &RuleCorpus {
        &self.corpus
    }

    pub fn analyze(&self, text: &str) -> AnalysisResult {
        analyze_with(&self.corpus, text)
    }
}

/// Analyze `text` with the built-in corpus.
pub fn analyze(text: &str) -> AnalysisResult {
    analyze_with(&BUILTIN_CORPUS, text)
}

fn analyze_with(corpus: &RuleCorpus, text: &str) -> AnalysisResult {
    let mut issues: Vec<Issue> = Vec::new();
    let mut penalty: u32 = 0;
    let mut counts = initial_counts();

    if text.trim().is_empty() {
        return AnalysisResult {
            issues,
            score: HP.score_max,
            suggestions: build_suggestions(&counts, 0),
            counts,
            total_penalty: 0,
        };
    }

    // Every rule scans the whole text; overlaps across rules are all reported.
    for rule in corpus.rules() {
        merge_output(&mut issues, &mut penalty, &mut counts, run_rule(rule, text));
    }

    let literal_count = counts
        .get(&Category::LiteralTranslation)
        .copied()
        .unwrap_or(0);
    if literal_count >= HP.heavy_literal_min {
        let heavy = RuleOutput {
            issues: vec![Issue {
                category: Category::UnnaturalPhrasing,
                original_span: String::new(),
                suggestion: HEAVY_PATTERNING_SUGGESTION.to_string(),
                confidence: HP.heavy_literal_confidence,
                explanation: HEAVY_PATTERNING_EXPLANATION.to_string(),
                start_index: 0,
                end_index: text.chars().count(),
            }],
            penalty: HP.heavy_literal_penalty,
        };
        merge_output(&mut issues, &mut penalty, &mut counts, heavy);
    }

    let score = HP.score_max.saturating_sub(penalty);
    let suggestions = build_suggestions(&counts, issues.len());

    AnalysisResult {
        issues,
        score,
        suggestions,
        counts,
        total_penalty: penalty,
    }
}
