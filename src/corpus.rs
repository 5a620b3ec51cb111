//! Detection rules for machine-translated Hebrew.
//!
//! A [`RuleCorpus`] is an ordered list of [`Rule`]s. Each rule owns a
//! [`Matcher`] that is either a regular expression or a literal substring.
//! Literal matchers are always compiled through [`regex::escape`], so text
//! coming from users or data files can never inject regex syntax.
//!
//! The built-in corpus is compiled once into [`BUILTIN_CORPUS`]. Additional
//! corpora can be loaded from TOML:
//!
//! ```toml
//! replace_builtin = false
//!
//! [[rules]]
//! kind = "literal"
//! pattern = "בסופו של יום"
//! suggestion = "בסופו של דבר"
//! explanation = "תרגום ישיר של at the end of the day"
//! category = "literal-translation"
//! weight = 8
//! ```

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    WordOrder,
    LiteralTranslation,
    Anglicism,
    Grammar,
    UnnaturalPhrasing,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::WordOrder,
        Category::LiteralTranslation,
        Category::Anglicism,
        Category::Grammar,
        Category::UnnaturalPhrasing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::WordOrder => "word-order",
            Category::LiteralTranslation => "literal-translation",
            Category::Anglicism => "anglicism",
            Category::Grammar => "grammar",
            Category::UnnaturalPhrasing => "unnatural-phrasing",
        }
    }

    /// Confidence attached to every issue a rule of this category reports.
    pub fn default_confidence(&self) -> f64 {
        match self {
            Category::WordOrder => 0.9,
            Category::Anglicism => 0.6,
            _ => 0.8,
        }
    }

    /// Score points deducted per match.
    pub fn default_weight(&self) -> u32 {
        match self {
            Category::LiteralTranslation | Category::UnnaturalPhrasing => 8,
            Category::Grammar => 5,
            Category::WordOrder => 4,
            Category::Anglicism => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Matchers and rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Regex,
    Literal,
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(Regex),
    Literal { text: String, compiled: Regex },
}

impl Matcher {
    pub fn pattern(source: &str) -> Result<Self, CorpusError> {
        if source.is_empty() {
            return Err(CorpusError::EmptyPattern);
        }
        let re = Regex::new(source).map_err(|source_err| CorpusError::InvalidPattern {
            pattern: source.to_string(),
            source: source_err,
        })?;
        Ok(Matcher::Pattern(re))
    }

    pub fn literal(text: &str) -> Result<Self, CorpusError> {
        if text.is_empty() {
            return Err(CorpusError::EmptyPattern);
        }
        let compiled =
            Regex::new(&regex::escape(text)).map_err(|source_err| CorpusError::InvalidPattern {
                pattern: text.to_string(),
                source: source_err,
            })?;
        Ok(Matcher::Literal {
            text: text.to_string(),
            compiled,
        })
    }

    pub fn kind(&self) -> MatcherKind {
        match self {
            Matcher::Pattern(_) => MatcherKind::Regex,
            Matcher::Literal { .. } => MatcherKind::Literal,
        }
    }

    /// The source the matcher was built from.
    pub fn as_str(&self) -> &str {
        match self {
            Matcher::Pattern(re) => re.as_str(),
            Matcher::Literal { text, .. } => text,
        }
    }

    /// Global, non-overlapping scan over the whole text.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> regex::Matches<'r, 't> {
        match self {
            Matcher::Pattern(re) => re.find_iter(text),
            Matcher::Literal { compiled, .. } => compiled.find_iter(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: Matcher,
    pub suggestion: String,
    pub explanation: String,
    pub category: Category,
    pub weight: u32,
    pub confidence: f64,
}

/// Serializable description of a rule, as found in corpus files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub kind: MatcherKind,
    pub pattern: String,
    pub suggestion: String,
    pub explanation: String,
    pub category: Category,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Rule {
    pub fn from_spec(spec: &RuleSpec) -> Result<Self, CorpusError> {
        let matcher = match spec.kind {
            MatcherKind::Regex => Matcher::pattern(&spec.pattern)?,
            MatcherKind::Literal => Matcher::literal(&spec.pattern)?,
        };
        Ok(Rule {
            matcher,
            suggestion: spec.suggestion.clone(),
            explanation: spec.explanation.clone(),
            category: spec.category,
            weight: spec.weight.unwrap_or_else(|| spec.category.default_weight()),
            confidence: spec
                .confidence
                .unwrap_or_else(|| spec.category.default_confidence())
                .clamp(0.0, 1.0),
        })
    }
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

type BuiltinRule = (MatcherKind, &'static str, &'static str, &'static str, Category);

const BUILTIN_RULES: &[BuiltinRule] = &[
    // Over-literal and formal phrasing
    (
        MatcherKind::Literal,
        "על מנת",
        "כדי",
        "'על מנת' נשמע פורמלי ומתורגם; בעברית טבעית כותבים 'כדי'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Literal,
        "במונחים של",
        "מבחינת",
        "תרגום ישיר של 'in terms of'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Literal,
        "על בסיס יומי",
        "כל יום",
        "תרגום ישיר של 'on a daily basis'",
        Category::LiteralTranslation,
    ),
    // Direct-translation idioms
    (
        MatcherKind::Literal,
        "להביא בחשבון",
        "לקחת בחשבון",
        "צירוף מתורגם; הצירוף המקובל בעברית הוא 'לקחת בחשבון'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Regex,
        r"(?:לוקח|לוקחת|לוקחים|לוקחות|לקח|לקחה|לקחו|ייקח|תיקח|לקחת) מקום",
        "מתרחש",
        "תרגום מילולי של 'take place'; עדיף 'מתרחש' או 'נערך'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Regex,
        r"(?:לעשות|עושה|עושים|עושות|עשה|עשתה|עשו) החלטה",
        "להחליט",
        "תרגום מילולי של 'make a decision'; בעברית פשוט 'להחליט'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Regex,
        r"(?:לעשות|עושה|עושים|עושות|עשה|עשתה|עשו) הבדל",
        "משנה",
        "תרגום מילולי של 'make a difference'; עדיף 'משנה' או 'משפיע'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Regex,
        r"(?:לשחק|משחק|משחקת|משחקים|שיחק|שיחקה|שיחקו) (?:תפקיד|חלק)",
        "ממלא תפקיד",
        "תרגום מילולי של 'play a role'; בעברית 'ממלא תפקיד'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Regex,
        r"(?:עושה|עושים|עשה) (?:שכל|היגיון)",
        "הגיוני",
        "תרגום מילולי של 'makes sense'; עדיף 'זה הגיוני'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Literal,
        "בסופו של יום",
        "בסופו של דבר",
        "תרגום ישיר של 'at the end of the day'",
        Category::LiteralTranslation,
    ),
    (
        MatcherKind::Literal,
        "לקחת את זה לשלב הבא",
        "להתקדם לשלב הבא",
        "תרגום ישיר של 'take it to the next level'",
        Category::LiteralTranslation,
    ),
    // Stilted connectives typical of generated text
    (
        MatcherKind::Literal,
        "יתר על כן",
        "חוץ מזה",
        "מילת קישור מליצית שמאפיינת טקסט שנוצר אוטומטית",
        Category::UnnaturalPhrasing,
    ),
    (
        MatcherKind::Regex,
        r"(?:ראוי|חשוב) לציין (?:כי|ש)",
        "אפשר להשמיט",
        "פתיח מיותר; פשוט כתבו את הטענה עצמה",
        Category::UnnaturalPhrasing,
    ),
    (
        MatcherKind::Literal,
        "לאור העובדה ש",
        "כיוון ש",
        "ניסוח מסורבל; 'כיוון ש' או 'מפני ש' קצרים וטבעיים יותר",
        Category::UnnaturalPhrasing,
    ),
    (
        MatcherKind::Literal,
        "באופן משמעותי",
        "מאוד",
        "תרגום של 'significantly'; בדרך כלל 'מאוד' או 'הרבה' מספיקים",
        Category::UnnaturalPhrasing,
    ),
    // Word order
    (
        MatcherKind::Regex,
        r"זה הוא\s",
        "זה ",
        "כפל נושא: 'הוא' אחרי 'זה' מיותר",
        Category::WordOrder,
    ),
    (
        MatcherKind::Regex,
        r"זו היא\s",
        "זו ",
        "כפל נושא: 'היא' אחרי 'זו' מיותר",
        Category::WordOrder,
    ),
    (
        MatcherKind::Regex,
        r"(?:אלה|אלו) הם\s",
        "אלה ",
        "כפל נושא: 'הם' אחרי 'אלה' מיותר",
        Category::WordOrder,
    ),
    (
        MatcherKind::Regex,
        r"מאוד (?:חשוב|חשובה|גדול|גדולה|קשה|טוב|טובה|יפה|חזק|חזקה)",
        "שם התואר ואחריו 'מאוד'",
        "בעברית 'מאוד' בא בדרך כלל אחרי שם התואר",
        Category::WordOrder,
    ),
    // Grammar
    (
        MatcherKind::Regex,
        r"יש (?:לי|לו|לה|לנו|לכם|לכן|להם|להן) את\s",
        "יש לי ה...",
        "אחרי 'יש ל...' לא כותבים 'את'",
        Category::Grammar,
    ),
    (
        MatcherKind::Regex,
        r"אחד מה(?:סיבות|דרכים|שאלות|בעיות|אפשרויות)",
        "אחת ה...",
        "התאמה במין: סיבה, דרך, שאלה, בעיה ואפשרות הן מילים בלשון נקבה",
        Category::Grammar,
    ),
];

/// Anglicism indicators and their Hebrew replacements. Matched as substrings.
const ANGLICISMS: &[(&str, &str)] = &[
    ("פידבק", "משוב"),
    ("דדליין", "מועד אחרון"),
    ("מיטינג", "פגישה"),
    ("אפדייט", "עדכון"),
    ("פוקוס", "מיקוד"),
    ("אימפקט", "השפעה"),
    ("צ'לנג'", "אתגר"),
    ("אינסייט", "תובנה"),
    ("ביזנס", "עסק"),
    ("טארגט", "יעד"),
    ("פרזנטציה", "מצגת"),
    ("אונבורדינג", "קליטה"),
];

fn builtin_specs() -> Vec<RuleSpec> {
    let mut specs: Vec<RuleSpec> = BUILTIN_RULES
        .iter()
        .map(|&(kind, pattern, suggestion, explanation, category)| RuleSpec {
            kind,
            pattern: pattern.to_string(),
            suggestion: suggestion.to_string(),
            explanation: explanation.to_string(),
            category,
            weight: None,
            confidence: None,
        })
        .collect();
    specs.extend(ANGLICISMS.iter().map(|&(word, replacement)| RuleSpec {
        kind: MatcherKind::Literal,
        pattern: word.to_string(),
        suggestion: replacement.to_string(),
        explanation: format!("'{word}' היא מילה לועזית; אפשר לכתוב '{replacement}'"),
        category: Category::Anglicism,
        weight: None,
        confidence: None,
    }));
    specs
}

pub static BUILTIN_CORPUS: Lazy<RuleCorpus> = Lazy::new(|| {
    let rules = builtin_specs()
        .iter()
        .map(|spec| Rule::from_spec(spec).unwrap())
        .collect();
    RuleCorpus { rules }
});

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    replace_builtin: bool,
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleCorpus {
    rules: Vec<Rule>,
}

impl RuleCorpus {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Self {
        BUILTIN_CORPUS.clone()
    }

    /// Build a corpus from specs, failing on the first invalid rule.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, CorpusError> {
        let rules = specs
            .iter()
            .map(Rule::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Parse a TOML corpus. Rules that fail to compile are skipped with a
    /// warning so one bad entry does not disable the whole file.
    pub fn from_toml_str(contents: &str) -> Result<Self, CorpusError> {
        let file: CorpusFile = toml::from_str(contents)?;
        let loaded = compile_lenient(&file.rules);
        if file.replace_builtin {
            Ok(loaded)
        } else {
            Ok(Self::builtin().extend(loaded))
        }
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Append the rules of `other` after this corpus' rules.
    pub fn extend(mut self, other: RuleCorpus) -> Self {
        self.rules.extend(other.rules);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_lenient(specs: &[RuleSpec]) -> RuleCorpus {
    let mut rules = Vec::with_capacity(specs.len());
    for spec in specs {
        match Rule::from_spec(spec) {
            Ok(rule) => rules.push(rule),
            Err(err) => log::warn!("Skipping corpus rule '{}': {}", spec.pattern, err),
        }
    }
    RuleCorpus { rules }
}
