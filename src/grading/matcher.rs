//! Answer comparison policy.
//!
//! Answer sheets are extracted from free-form input, so a submitted
//! `"b"`, `"B."` or `"(B) goes"` all mean option B. How lenient the
//! comparison is comes from `[grading]` configuration.

use serde::{Deserialize, Serialize};

/// Compares a submitted answer against the standard answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMatcher {
    /// Ignore letter case when comparing.
    pub case_insensitive: bool,
    /// Reduce `"A. text"`, `"A)"`, `"(A)"` to the bare option letter.
    pub strip_option_prefix: bool,
}

impl Default for AnswerMatcher {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            strip_option_prefix: true,
        }
    }
}

impl AnswerMatcher {
    /// Exact comparison after trimming whitespace.
    #[cfg(test)]
    pub fn strict() -> Self {
        Self {
            case_insensitive: false,
            strip_option_prefix: false,
        }
    }

    /// Canonical form of an answer under this policy.
    pub fn canonical(&self, answer: &str) -> String {
        let trimmed = answer.trim();
        let reduced = if self.strip_option_prefix {
            option_letter(trimmed)
                .map(String::from)
                .unwrap_or_else(|| trimmed.to_string())
        } else {
            trimmed.to_string()
        };

        if self.case_insensitive {
            reduced.to_uppercase()
        } else {
            reduced
        }
    }

    /// Whether `submitted` counts as `correct`.
    pub fn matches(&self, submitted: &str, correct: &str) -> bool {
        let submitted = self.canonical(submitted);
        !submitted.is_empty() && submitted == self.canonical(correct)
    }
}

/// Extract a leading option letter, if the answer is shaped like one.
fn option_letter(answer: &str) -> Option<&str> {
    let mut chars = answer.char_indices();

    // "(A)" or "(A) text"
    if answer.starts_with('(') || answer.starts_with('（') {
        let (_, open) = chars.next()?;
        let (idx, letter) = chars.next()?;
        let (_, close) = chars.next()?;
        let closes = matches!((open, close), ('(', ')') | ('（', '）'));
        return (letter.is_ascii_alphabetic() && closes).then(|| &answer[idx..idx + 1]);
    }

    let (_, letter) = chars.next()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    match chars.next() {
        None => Some(&answer[..1]),
        // A space is not a separator: "a book" is a word answer.
        Some((_, sep)) if matches!(sep, '.' | ')' | ':' | '、' | '．' | '）' | '：') => {
            Some(&answer[..1])
        }
        _ => None,
    }
}
