//! Grading engine.
//!
//! Grades one student's answers against a standard answer set. Every
//! function here is pure: the same key and sheet always give the same
//! result, so batches can be graded on any number of threads.

use crate::error::{GradingError, GradingResult};
use crate::grading::matcher::AnswerMatcher;
use crate::models::{GradeBatch, Outcome, StandardAnswerSet, StudentAnswer, StudentResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// How a fractional score is turned into an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingPolicy {
    /// Round half up (2/3 of 100 gives 67).
    #[default]
    Nearest,
    /// Truncate toward zero (2/3 of 100 gives 66).
    Floor,
}

impl RoundingPolicy {
    /// `correct / total * max_score`, in exact integer arithmetic.
    pub fn score(&self, correct: usize, total: usize, max_score: u32) -> u32 {
        debug_assert!(total > 0);
        let numerator = correct as u64 * max_score as u64;
        let total = total as u64;
        let score = match self {
            RoundingPolicy::Nearest => (2 * numerator + total) / (2 * total),
            RoundingPolicy::Floor => numerator / total,
        };
        score as u32
    }
}

/// Settings for a grading run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradingOptions {
    pub max_score: u32,
    pub rounding: RoundingPolicy,
    pub matcher: AnswerMatcher,
}

impl Default for GradingOptions {
    fn default() -> Self {
        Self {
            max_score: 100,
            rounding: RoundingPolicy::default(),
            matcher: AnswerMatcher::default(),
        }
    }
}

impl From<&crate::config::GradingConfig> for GradingOptions {
    fn from(config: &crate::config::GradingConfig) -> Self {
        Self {
            max_score: config.max_score,
            rounding: config.rounding,
            matcher: AnswerMatcher {
                case_insensitive: config.case_insensitive,
                strip_option_prefix: config.strip_option_prefix,
            },
        }
    }
}

/// Grade a single student.
///
/// Answers for numbers outside the key are ignored. Fails when the key
/// is empty or the sheet was prepared against a different key.
pub fn grade_student(
    answer_set: &StandardAnswerSet,
    answer: &StudentAnswer,
    options: &GradingOptions,
) -> GradingResult<StudentResult> {
    if answer_set.is_empty() {
        return Err(GradingError::extraction(
            "standard answer set has no questions to grade against",
        ));
    }

    if let Some(found) = &answer.answer_set_fingerprint {
        if found != answer_set.fingerprint() {
            return Err(GradingError::DataMismatch {
                student: answer.student_name.clone(),
                expected: answer_set.fingerprint().to_string(),
                found: found.clone(),
            });
        }
    }

    let mut per_question_outcome = BTreeMap::new();
    let mut submitted_answers = BTreeMap::new();
    let (mut correct, mut wrong, mut missing) = (0usize, 0usize, 0usize);

    for question in answer_set.questions() {
        let outcome = match answer.answers.get(&question.number) {
            None => Outcome::Missing,
            Some(submitted) => {
                submitted_answers.insert(question.number, submitted.clone());
                if options.matcher.matches(submitted, &question.correct_answer) {
                    Outcome::Correct
                } else {
                    Outcome::Wrong
                }
            }
        };

        match outcome {
            Outcome::Correct => correct += 1,
            Outcome::Wrong => wrong += 1,
            Outcome::Missing => missing += 1,
        }
        per_question_outcome.insert(question.number, outcome);
    }

    let ignored = answer
        .answers
        .keys()
        .filter(|n| answer_set.question(**n).is_none())
        .count();
    if ignored > 0 {
        debug!(
            "Ignoring {} answers for unknown questions on sheet of {}",
            ignored, answer.student_name
        );
    }

    let score = options
        .rounding
        .score(correct, answer_set.total_questions(), options.max_score);

    Ok(StudentResult {
        student_name: answer.student_name.clone(),
        per_question_outcome,
        submitted_answers,
        correct_count: correct,
        wrong_count: wrong,
        missing_count: missing,
        score,
    })
}

/// Grade every sheet of a class, using up to `workers` threads.
///
/// Results keep the order of `answers`. The first failing sheet aborts
/// the batch so that a partial batch is never reported as complete.
pub fn grade_batch(
    answer_set: &StandardAnswerSet,
    answers: &[StudentAnswer],
    options: &GradingOptions,
    workers: usize,
) -> GradingResult<GradeBatch> {
    if answer_set.is_empty() {
        return Err(GradingError::extraction(
            "standard answer set has no questions to grade against",
        ));
    }

    let workers = workers.max(1);
    let chunk_size = answers.len().div_ceil(workers).max(1);

    let chunks: Vec<GradingResult<Vec<StudentResult>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = answers
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|answer| grade_student(answer_set, answer, options))
                        .collect::<GradingResult<Vec<_>>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    let mut results = Vec::with_capacity(answers.len());
    for chunk in chunks {
        results.extend(chunk?);
    }

    debug!("Graded {} students on {} threads", results.len(), workers);

    Ok(GradeBatch {
        answer_set_fingerprint: answer_set.fingerprint().to_string(),
        total_questions: answer_set.total_questions(),
        max_score: options.max_score,
        results,
    })
}
