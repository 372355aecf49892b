//! Raw shapes produced by the extraction collaborator.
//!
//! These mirror the loosely typed JSON an extractor returns. Nothing
//! here is trusted; the normalizer validates every field before a
//! question enters the answer key.

use crate::models::{Passage, Question};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Output of document extraction: three independent collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExamExtraction {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub grammar_questions: Vec<RawQuestion>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reading_questions: Vec<RawPassage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub language_use_questions: Vec<RawPassage>,
}

impl RawExamExtraction {
    /// Number of questions across all collections, before validation.
    pub fn question_count(&self) -> usize {
        self.grammar_questions.len()
            + self
                .reading_questions
                .iter()
                .chain(&self.language_use_questions)
                .map(|p| p.questions.len())
                .sum::<usize>()
    }
}

/// A question as extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(alias = "number", deserialize_with = "lenient_number")]
    pub question_number: i64,
    #[serde(default, alias = "text")]
    pub question_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: String,
}

/// A reading or cloze passage with nested questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPassage {
    #[serde(default, alias = "title")]
    pub passage_title: Option<String>,
    #[serde(default, alias = "text")]
    pub passage_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub questions: Vec<RawQuestion>,
}

/// A previously saved answer key, re-validated on load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredAnswerSet {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub passages: Vec<Passage>,
}

/// Accept `12`, `"12"`, or `" 12 "` for a question number.
fn lenient_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid question number: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid question number: {:?}", s))),
        other => Err(serde::de::Error::custom(format!(
            "invalid question number: {}",
            other
        ))),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_extraction() {
        let json = r#"{
            "grammar_questions": [
                {"question_number": 1, "question_text": "He ___ home.", "options": ["A. go", "B. goes"], "correct_answer": "B"}
            ],
            "reading_questions": [
                {"passage_title": "A", "passage_text": "Once upon a time", "questions": [
                    {"question_number": "21", "question_text": "Why?", "options": [], "correct_answer": "C"}
                ]}
            ],
            "language_use_questions": [
                {"passage_text": "I ___ to", "questions": [
                    {"question_number": 29, "blank_number": 29, "options": ["A. study"], "correct_answer": "D"}
                ]}
            ]
        }"#;

        let raw: RawExamExtraction = serde_json::from_str(json).unwrap();
        assert_eq!(raw.grammar_questions.len(), 1);
        assert_eq!(raw.reading_questions[0].questions[0].question_number, 21);
        assert_eq!(raw.language_use_questions[0].passage_title, None);
        assert_eq!(raw.question_count(), 3);
    }

    #[test]
    fn test_missing_and_null_collections() {
        let raw: RawExamExtraction =
            serde_json::from_str(r#"{"grammar_questions": null}"#).unwrap();
        assert_eq!(raw.question_count(), 0);
    }

    #[test]
    fn test_rejects_non_numeric_number() {
        let result = serde_json::from_str::<RawQuestion>(
            r#"{"question_number": "twelve", "correct_answer": "A"}"#,
        );
        assert!(result.is_err());
    }
}
