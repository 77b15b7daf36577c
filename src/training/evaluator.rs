//! Answer evaluation
//!
//! Scores a typed answer against the expected text:
//! - exact match (after whitespace collapsing) is the only way to be correct
//! - near misses within the stage's edit budget get one second chance
//! - hints get more specific the lower the stage
//!
//! Everything here is pure; the session runtime decides what a verdict does
//! to the card's stage.

use std::fmt;

use unicode_normalization::UnicodeNormalization;

use super::models::MAX_STAGE;

/// Title shown with every second-chance hint
pub const ALMOST_RIGHT_TITLE: &str = "Almost right….";

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Final: the stage goes up
    Correct,
    /// Not final: the item is re-presented once
    SecondChance,
    /// Final: the stage goes down
    Incorrect,
}

impl Verdict {
    pub fn is_final(&self) -> bool {
        !matches!(self, Verdict::SecondChance)
    }
}

/// A second-chance hint line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    CaseOnly,
    LookClosely,
    SomethingOff,
    Accents,
    Tilde,
    Apostrophe,
    Punctuation,
    MissingWord,
    AdditionalErrors { total: usize },
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::CaseOnly => f.write_str("Watch the upper and lower case."),
            Hint::LookClosely => f.write_str("Look closely once more."),
            Hint::SomethingOff => f.write_str("Something is not quite right yet."),
            Hint::Accents => f.write_str("Watch the accents."),
            Hint::Tilde => f.write_str("Watch the tilde over the n."),
            Hint::Apostrophe => f.write_str("Watch the apostrophe."),
            Hint::Punctuation => f.write_str("Watch the punctuation."),
            Hint::MissingWord => f.write_str("A word is still missing."),
            Hint::AdditionalErrors { total } => {
                write!(f, "There are more errors ({} in total).", total)
            }
        }
    }
}

/// Error breakdown between a typed and an expected answer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerAnalysis {
    pub expected_norm: String,
    pub typed_norm: String,
    /// Character edit distance of the normalized strings
    pub distance: usize,
    pub case_errors: usize,
    pub punct_errors: usize,
    pub accent_errors: usize,
    /// Edits left once case, punctuation and accents are ignored
    pub letter_errors: usize,
    /// Only letter case differs
    pub case_only: bool,
    /// Typed has fewer words and at least one expected word is absent
    pub missing_word: bool,
}

impl AnswerAnalysis {
    pub fn is_exact(&self) -> bool {
        self.expected_norm == self.typed_norm
    }
}

/// Result of [`evaluate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub hints: Vec<Hint>,
    /// The expected answer as stored, for the "correct solution" display
    pub expected: String,
    /// The answer as typed, for the struck-through display
    pub typed: String,
    pub analysis: AnswerAnalysis,
}

impl Evaluation {
    /// Dialog title for second-chance feedback
    pub fn title(&self) -> Option<&'static str> {
        match self.verdict {
            Verdict::SecondChance => Some(ALMOST_RIGHT_TITLE),
            _ => None,
        }
    }
}

/// Collapse whitespace runs to single spaces and trim the ends
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Character-level Levenshtein distance
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut cur = vec![0; b_chars.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b_chars.len()]
}

/// Edit budget within which a near miss earns a second chance
pub fn second_chance_budget(stage: u8) -> Option<usize> {
    match stage {
        1 | 2 => Some(4),
        3 => Some(2),
        _ => None,
    }
}

fn strip_punctuation(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    normalize(&kept)
}

fn remove_accents(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

/// Break the difference between `typed` and `expected` down by kind.
///
/// Each layer (case, punctuation, accents) is peeled off in turn and its
/// share is the drop in edit distance it causes.
pub fn analyze(expected: &str, typed: &str) -> AnswerAnalysis {
    let expected_norm = normalize(expected);
    let typed_norm = normalize(typed);
    let distance = levenshtein(&expected_norm, &typed_norm);

    let expected_lower = expected_norm.to_lowercase();
    let typed_lower = typed_norm.to_lowercase();
    let lower_distance = levenshtein(&expected_lower, &typed_lower);

    let expected_plain = strip_punctuation(&expected_lower);
    let typed_plain = strip_punctuation(&typed_lower);
    let plain_distance = levenshtein(&expected_plain, &typed_plain);

    let expected_folded = remove_accents(&expected_plain);
    let typed_folded = remove_accents(&typed_plain);
    let letter_errors = levenshtein(&expected_folded, &typed_folded);

    let expected_words: Vec<&str> = expected_folded.split(' ').filter(|w| !w.is_empty()).collect();
    let typed_words: Vec<&str> = typed_folded.split(' ').filter(|w| !w.is_empty()).collect();
    let missing_word = typed_words.len() < expected_words.len()
        && expected_words.iter().any(|word| !typed_words.contains(word));

    AnswerAnalysis {
        case_errors: distance.saturating_sub(lower_distance),
        punct_errors: lower_distance.saturating_sub(plain_distance),
        accent_errors: plain_distance.saturating_sub(letter_errors),
        letter_errors,
        case_only: expected_norm != typed_norm && expected_lower == typed_lower,
        missing_word,
        distance,
        expected_norm,
        typed_norm,
    }
}

fn second_chance_hints(stage: u8, analysis: &AnswerAnalysis, expected: &str) -> Vec<Hint> {
    let mut hints = Vec::new();

    if stage == 3 {
        if analysis.case_only {
            hints.push(Hint::CaseOnly);
        } else if analysis.letter_errors > 0 {
            hints.push(Hint::LookClosely);
        } else {
            hints.push(Hint::SomethingOff);
        }
        return hints;
    }

    if analysis.case_only {
        hints.push(Hint::CaseOnly);
    } else if analysis.letter_errors > 0 {
        hints.push(Hint::LookClosely);
    }

    if analysis.accent_errors > 0 {
        if expected.contains(['ñ', 'Ñ']) {
            hints.push(Hint::Tilde);
        } else {
            hints.push(Hint::Accents);
        }
    }

    if analysis.punct_errors > 0 {
        if expected.contains(['\'', '’', '´']) {
            hints.push(Hint::Apostrophe);
        } else {
            hints.push(Hint::Punctuation);
        }
    }

    if stage == 1 && analysis.missing_word {
        hints.push(Hint::MissingWord);
    }

    if analysis.letter_errors > 0 && (analysis.accent_errors > 0 || analysis.punct_errors > 0) {
        hints.push(Hint::AdditionalErrors {
            total: analysis.letter_errors + analysis.accent_errors + analysis.punct_errors,
        });
    }

    if hints.is_empty() {
        hints.push(Hint::SomethingOff);
    }
    hints
}

/// Evaluate a first attempt at `stage`
pub fn evaluate(expected: &str, typed: &str, stage: u8) -> Evaluation {
    let analysis = analyze(expected, typed);

    let (verdict, hints) = if analysis.is_exact() {
        (Verdict::Correct, Vec::new())
    } else {
        match second_chance_budget(stage.min(MAX_STAGE)) {
            Some(budget) if analysis.distance <= budget => (
                Verdict::SecondChance,
                second_chance_hints(stage, &analysis, expected),
            ),
            _ => (Verdict::Incorrect, Vec::new()),
        }
    };

    Evaluation {
        verdict,
        hints,
        expected: expected.to_string(),
        typed: typed.to_string(),
        analysis,
    }
}

/// Evaluate the one re-attempt after a second chance; anything but exact is final-incorrect
pub fn evaluate_second_attempt(expected: &str, typed: &str) -> Evaluation {
    let analysis = analyze(expected, typed);
    let verdict = if analysis.is_exact() {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    };

    Evaluation {
        verdict,
        hints: Vec::new(),
        expected: expected.to_string(),
        typed: typed.to_string(),
        analysis,
    }
}
