//! Domain error types for the grading pipeline.
//!
//! Only conditions that must stop an operation live here. Incomplete
//! answer sheets and stray question numbers are not errors; they
//! degrade into `missing` or ignored outcomes during grading.

use thiserror::Error;

/// Errors raised by normalization, grading, and extraction parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    /// Extraction produced nothing usable (zero questions, zero students,
    /// or a reply that could not be parsed).
    #[error("extraction incomplete: {context}")]
    ExtractionIncomplete { context: String },

    /// The question schema is internally inconsistent.
    #[error("schema integrity violation: {0}")]
    SchemaIntegrity(IntegrityIssue),

    /// A student answer was produced against a different answer key.
    #[error(
        "answer key mismatch for {student}: sheet targets {found}, current key is {expected}"
    )]
    DataMismatch {
        student: String,
        expected: String,
        found: String,
    },
}

/// Specific schema integrity problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityIssue {
    #[error("question {number} appears more than once ({first} and {second})")]
    DuplicateQuestion {
        number: u32,
        first: String,
        second: String,
    },

    #[error("question numbers must be positive, found {number}")]
    InvalidQuestionNumber { number: i64 },

    #[error("question {number} references unknown passage '{passage_id}'")]
    UnknownPassage { number: u32, passage_id: String },

    #[error("question {number} in section {section} cannot belong to a passage")]
    UnexpectedPassage { number: u32, section: String },

    #[error("question {number} has no correct answer")]
    EmptyCorrectAnswer { number: u32 },

    #[error("passage '{passage_id}' is in section {section}, which has no passages")]
    PassageInWrongSection { passage_id: String, section: String },

    #[error("passage '{passage_id}' appears more than once")]
    DuplicatePassage { passage_id: String },
}

impl GradingError {
    /// Shorthand for an extraction failure with a message.
    pub fn extraction(context: impl Into<String>) -> Self {
        GradingError::ExtractionIncomplete {
            context: context.into(),
        }
    }
}

impl From<IntegrityIssue> for GradingError {
    fn from(issue: IntegrityIssue) -> Self {
        GradingError::SchemaIntegrity(issue)
    }
}

/// Result alias for domain operations.
pub type GradingResult<T> = Result<T, GradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_issue_converts() {
        let err: GradingError = IntegrityIssue::EmptyCorrectAnswer { number: 4 }.into();
        assert!(matches!(err, GradingError::SchemaIntegrity(_)));
        assert_eq!(
            err.to_string(),
            "schema integrity violation: question 4 has no correct answer"
        );
    }

    #[test]
    fn test_extraction_message() {
        let err = GradingError::extraction("no questions found");
        assert_eq!(err.to_string(), "extraction incomplete: no questions found");
    }
}
