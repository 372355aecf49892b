//! Per-question performance.
//!
//! Transposes a grade batch by question number. The statistics carry
//! no thresholds; summaries such as the hardest question are derived
//! separately by [`summarize_questions`].

use crate::models::{
    GradeBatch, Outcome, QuestionStatistic, QuestionSummary, StandardAnswerSet,
};
use std::collections::HashMap;

/// Count outcomes per question across all students.
///
/// Covers every question number that appears in any result. The order
/// of the returned statistics is unspecified; see [`sort_by_number`].
pub fn question_statistics(
    batch: &GradeBatch,
    answer_set: &StandardAnswerSet,
) -> Vec<QuestionStatistic> {
    let mut counts: HashMap<u32, [usize; 3]> = HashMap::new();

    for result in &batch.results {
        for (number, outcome) in &result.per_question_outcome {
            let entry = counts.entry(*number).or_default();
            match outcome {
                Outcome::Correct => entry[0] += 1,
                Outcome::Wrong => entry[1] += 1,
                Outcome::Missing => entry[2] += 1,
            }
        }
    }

    let total_students = batch.len();
    counts
        .into_iter()
        .map(|(number, [correct, wrong, missing])| QuestionStatistic {
            question_number: number,
            correct_answer: answer_set
                .question(number)
                .map(|q| q.correct_answer.clone())
                .unwrap_or_default(),
            correct_count: correct,
            wrong_count: wrong,
            missing_count: missing,
            accuracy_rate: accuracy_rate(correct, total_students),
        })
        .collect()
}

/// Percentage of students answering correctly.
pub fn accuracy_rate(correct: usize, total_students: usize) -> Option<f64> {
    (total_students > 0).then(|| correct as f64 / total_students as f64 * 100.0)
}

/// Conventional presentation order: ascending by question number.
pub fn sort_by_number(stats: &mut [QuestionStatistic]) {
    stats.sort_by_key(|s| s.question_number);
}

/// Derive summary facts from question statistics.
///
/// Questions without an accuracy rate are skipped. The hardest
/// question has the minimum accuracy, ties going to the lowest number.
pub fn summarize_questions(
    stats: &[QuestionStatistic],
    high_threshold: f64,
    low_threshold: f64,
) -> QuestionSummary {
    let rated: Vec<(u32, f64)> = stats
        .iter()
        .filter_map(|s| s.accuracy_rate.map(|rate| (s.question_number, rate)))
        .collect();

    let average_accuracy = (!rated.is_empty())
        .then(|| rated.iter().map(|(_, rate)| rate).sum::<f64>() / rated.len() as f64);

    let hardest = rated.iter().copied().min_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    QuestionSummary {
        average_accuracy,
        hardest_question: hardest.map(|(number, _)| number),
        hardest_accuracy: hardest.map(|(_, rate)| rate),
        high_accuracy_threshold: high_threshold,
        low_accuracy_threshold: low_threshold,
        high_accuracy_count: rated.iter().filter(|(_, r)| *r >= high_threshold).count(),
        low_accuracy_count: rated.iter().filter(|(_, r)| *r < low_threshold).count(),
    }
}
