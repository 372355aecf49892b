//! Class-level score statistics.
//!
//! Reduces a complete grade batch into averages, extrema, pass rate,
//! and a fixed-bucket score histogram.

use crate::models::{GradeBatch, PopulationStatistics};
use std::collections::BTreeMap;

/// Fixed score ranges, expressed as a percentage of the maximum score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScoreBucket {
    Excellent,
    Good,
    Fair,
    Pass,
    Fail,
}

impl ScoreBucket {
    /// Buckets from highest to lowest.
    pub const ALL: [ScoreBucket; 5] = [
        ScoreBucket::Excellent,
        ScoreBucket::Good,
        ScoreBucket::Fair,
        ScoreBucket::Pass,
        ScoreBucket::Fail,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBucket::Excellent => "90-100",
            ScoreBucket::Good => "80-89",
            ScoreBucket::Fair => "70-79",
            ScoreBucket::Pass => "60-69",
            ScoreBucket::Fail => "0-59",
        }
    }

    /// Bucket for a whole-number percentage. Anything from 90 up is the
    /// top bucket, so every student lands in exactly one.
    pub fn for_percent(percent: u32) -> Self {
        match percent {
            90.. => ScoreBucket::Excellent,
            80..=89 => ScoreBucket::Good,
            70..=79 => ScoreBucket::Fair,
            60..=69 => ScoreBucket::Pass,
            _ => ScoreBucket::Fail,
        }
    }

    /// Bucket for a score out of `max_score`. Percentages are truncated.
    pub fn for_score(score: u32, max_score: u32) -> Self {
        if max_score == 0 {
            return ScoreBucket::Fail;
        }
        let percent = (score as u64 * 100) / max_score as u64;
        Self::for_percent(percent.min(u32::MAX as u64) as u32)
    }
}

/// Compute population statistics for a batch.
///
/// An empty batch is valid: it is flagged `is_empty`, optional fields
/// are `None`, and every bucket is zero.
pub fn population_statistics(batch: &GradeBatch, pass_threshold: u32) -> PopulationStatistics {
    let mut score_distribution: BTreeMap<String, usize> = ScoreBucket::ALL
        .iter()
        .map(|b| (b.label().to_string(), 0))
        .collect();

    let total_students = batch.len();
    if total_students == 0 {
        return PopulationStatistics {
            total_students,
            is_empty: true,
            average_score: None,
            highest_score: None,
            lowest_score: None,
            pass_rate: None,
            pass_threshold,
            score_distribution,
            total_questions: batch.total_questions,
        };
    }

    let mut sum = 0u64;
    let mut highest = u32::MIN;
    let mut lowest = u32::MAX;
    let mut passed = 0usize;

    for result in &batch.results {
        sum += result.score as u64;
        highest = highest.max(result.score);
        lowest = lowest.min(result.score);
        if result.score >= pass_threshold {
            passed += 1;
        }
        let bucket = ScoreBucket::for_score(result.score, batch.max_score);
        *score_distribution
            .entry(bucket.label().to_string())
            .or_insert(0) += 1;
    }

    PopulationStatistics {
        total_students,
        is_empty: false,
        average_score: Some(sum as f64 / total_students as f64),
        highest_score: Some(highest),
        lowest_score: Some(lowest),
        pass_rate: Some(passed as f64 / total_students as f64 * 100.0),
        pass_threshold,
        score_distribution,
        total_questions: batch.total_questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentResult;

    fn batch_with_scores(scores: &[u32]) -> GradeBatch {
        GradeBatch {
            answer_set_fingerprint: "test".to_string(),
            total_questions: 100,
            max_score: 100,
            results: scores
                .iter()
                .enumerate()
                .map(|(i, score)| StudentResult {
                    student_name: format!("student-{}", i),
                    per_question_outcome: Default::default(),
                    submitted_answers: Default::default(),
                    correct_count: *score as usize,
                    wrong_count: 100 - *score as usize,
                    missing_count: 0,
                    score: *score,
                })
                .collect(),
        }
    }

    #[test]
    fn test_example_batch() {
        let stats = population_statistics(&batch_with_scores(&[95, 72, 58, 61]), 60);

        assert_eq!(stats.total_students, 4);
        assert!(!stats.is_empty);
        // 95, 72 and 61 are at or above the pass mark
        assert_eq!(stats.pass_rate, Some(75.0));
        assert_eq!(stats.average_score, Some(71.5));
        assert_eq!(stats.highest_score, Some(95));
        assert_eq!(stats.lowest_score, Some(58));
        assert_eq!(stats.score_distribution["90-100"], 1);
        assert_eq!(stats.score_distribution["80-89"], 0);
        assert_eq!(stats.score_distribution["70-79"], 1);
        assert_eq!(stats.score_distribution["60-69"], 1);
        assert_eq!(stats.score_distribution["0-59"], 1);
    }

    #[test]
    fn test_distribution_sums_to_students() {
        let scores: Vec<u32> = (0..=100).collect();
        let stats = population_statistics(&batch_with_scores(&scores), 60);
        let sum: usize = stats.score_distribution.values().sum();
        assert_eq!(sum, stats.total_students);
        assert_eq!(stats.score_distribution["90-100"], 11);
        assert_eq!(stats.score_distribution["0-59"], 60);
    }

    #[test]
    fn test_average_within_extrema() {
        for scores in [vec![10, 20, 99], vec![60], vec![0, 0, 100, 33, 67]] {
            let stats = population_statistics(&batch_with_scores(&scores), 60);
            let avg = stats.average_score.unwrap();
            assert!(avg >= stats.lowest_score.unwrap() as f64);
            assert!(avg <= stats.highest_score.unwrap() as f64);
        }
    }

    #[test]
    fn test_empty_batch_is_flagged() {
        let stats = population_statistics(&batch_with_scores(&[]), 60);
        assert!(stats.is_empty);
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.average_score, None);
        assert_eq!(stats.highest_score, None);
        assert_eq!(stats.lowest_score, None);
        assert_eq!(stats.pass_rate, None);
        assert_eq!(stats.score_distribution.len(), 5);
        assert!(stats.score_distribution.values().all(|c| *c == 0));
    }

    #[test]
    fn test_zero_score_is_not_missing_data() {
        let stats = population_statistics(&batch_with_scores(&[0]), 60);
        assert_eq!(stats.lowest_score, Some(0));
        assert_eq!(stats.pass_rate, Some(0.0));
    }

    #[test]
    fn test_bucket_for_other_max_score() {
        assert_eq!(ScoreBucket::for_score(135, 150), ScoreBucket::Excellent);
        assert_eq!(ScoreBucket::for_score(134, 150), ScoreBucket::Good);
        assert_eq!(ScoreBucket::for_score(0, 0), ScoreBucket::Fail);
    }
}
