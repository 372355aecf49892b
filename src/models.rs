//! Data models for the exam grader.
//!
//! This module contains the core data structures shared across the
//! pipeline: the normalized answer key, student submissions, grading
//! results, derived statistics, and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Exam section a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Stand-alone grammar multiple choice
    Grammar,
    /// Reading comprehension, grouped under passages
    Reading,
    /// Language use (cloze), grouped under passages
    LanguageUse,
}

impl Section {
    /// All sections in exam order.
    pub const ALL: [Section; 3] = [Section::Grammar, Section::Reading, Section::LanguageUse];

    /// Stable identifier used in JSON payloads and passage ids.
    pub fn key(&self) -> &'static str {
        match self {
            Section::Grammar => "grammar",
            Section::Reading => "reading",
            Section::LanguageUse => "language_use",
        }
    }

    /// Whether questions of this section are grouped under a passage.
    pub fn has_passages(&self) -> bool {
        !matches!(self, Section::Grammar)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Grammar => write!(f, "Grammar"),
            Section::Reading => write!(f, "Reading"),
            Section::LanguageUse => write!(f, "Language Use"),
        }
    }
}

/// A single exam question with its standard answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Exam-wide unique question number (1-indexed).
    pub number: u32,
    /// Question stem. Empty for cloze blanks.
    #[serde(default)]
    pub text: String,
    /// Answer options in display order.
    #[serde(default)]
    pub options: Vec<String>,
    /// The standard answer.
    pub correct_answer: String,
    /// Originating section.
    pub section: Section,
    /// Passage this question belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_id: Option<String>,
}

/// Shared text grouping a contiguous block of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Identifier referenced by `Question::passage_id`.
    pub id: String,
    /// Section the passage belongs to.
    pub section: Section,
    /// Passage heading (e.g. "A").
    #[serde(default)]
    pub title: String,
    /// Passage text.
    #[serde(default)]
    pub body: String,
    /// Numbers of the questions under this passage, ascending.
    #[serde(default)]
    pub question_numbers: Vec<u32>,
}

/// Question counts per section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCounts {
    pub grammar_count: usize,
    pub reading_count: usize,
    pub language_use_count: usize,
    pub total_questions: usize,
}

impl SectionCounts {
    /// Count questions per section.
    pub fn from_questions(questions: &[Question]) -> Self {
        let mut counts = Self::default();
        for question in questions {
            match question.section {
                Section::Grammar => counts.grammar_count += 1,
                Section::Reading => counts.reading_count += 1,
                Section::LanguageUse => counts.language_use_count += 1,
            }
        }
        counts.total_questions = questions.len();
        counts
    }

    /// Count for one section.
    pub fn for_section(&self, section: Section) -> usize {
        match section {
            Section::Grammar => self.grammar_count,
            Section::Reading => self.reading_count,
            Section::LanguageUse => self.language_use_count,
        }
    }
}

/// The normalized, immutable answer key for one exam.
///
/// Built only by the schema normalizer, which guarantees unique
/// positive question numbers sorted ascending and valid passage
/// references. Re-extraction produces a new set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandardAnswerSet {
    questions: Vec<Question>,
    passages: Vec<Passage>,
    counts: SectionCounts,
    fingerprint: String,
}

impl StandardAnswerSet {
    /// Assemble a set from already validated, sorted parts.
    pub(crate) fn from_validated(questions: Vec<Question>, passages: Vec<Passage>) -> Self {
        let counts = SectionCounts::from_questions(&questions);
        let fingerprint = fingerprint_questions(&questions);
        Self {
            questions,
            passages,
            counts,
            fingerprint,
        }
    }

    /// Questions ascending by number.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Passages in extraction order.
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn counts(&self) -> SectionCounts {
        self.counts
    }

    /// Hex SHA-256 over the ordered answer key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Look up a question by number.
    pub fn question(&self, number: u32) -> Option<&Question> {
        self.questions
            .binary_search_by_key(&number, |q| q.number)
            .ok()
            .map(|idx| &self.questions[idx])
    }
}

/// Fingerprint depends only on what grading reads: number, section, answer.
fn fingerprint_questions(questions: &[Question]) -> String {
    let mut hasher = Sha256::new();
    for question in questions {
        hasher.update(question.number.to_le_bytes());
        hasher.update(question.section.key().as_bytes());
        hasher.update(b"|");
        hasher.update(question.correct_answer.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// One student's parsed answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAnswer {
    /// Student name as printed on the sheet.
    #[serde(default, alias = "name")]
    pub student_name: String,
    /// Submitted choice per question number. Absent means unanswered.
    #[serde(default)]
    pub answers: BTreeMap<u32, String>,
    /// Fingerprint of the answer key this sheet was prepared against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_set_fingerprint: Option<String>,
}

#[cfg(test)]
impl StudentAnswer {
    pub fn new(student_name: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            answers: BTreeMap::new(),
            answer_set_fingerprint: None,
        }
    }

    /// Builder-style helper to record an answer.
    pub fn with_answer(mut self, number: u32, answer: impl Into<String>) -> Self {
        self.answers.insert(number, answer.into());
        self
    }
}

/// Outcome of one question for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Wrong,
    Missing,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Correct => "✅",
            Outcome::Wrong => "❌",
            Outcome::Missing => "➖",
        }
    }
}

/// Deterministic grading result for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentResult {
    pub student_name: String,
    /// Outcome for every question of the answer key.
    pub per_question_outcome: BTreeMap<u32, Outcome>,
    /// Raw submitted answers for the graded questions.
    #[serde(default)]
    pub submitted_answers: BTreeMap<u32, String>,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub missing_count: usize,
    pub score: u32,
}

impl StudentResult {
    /// Number of graded questions.
    pub fn total_questions(&self) -> usize {
        self.correct_count + self.wrong_count + self.missing_count
    }

    pub fn outcome(&self, number: u32) -> Option<Outcome> {
        self.per_question_outcome.get(&number).copied()
    }
}

/// All results of one grading run against one answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBatch {
    /// Fingerprint of the answer key used.
    pub answer_set_fingerprint: String,
    pub total_questions: usize,
    pub max_score: u32,
    /// Results in answer-sheet order.
    pub results: Vec<StudentResult>,
}

impl GradeBatch {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results sorted by score, highest first, ties by name.
    pub fn ranked(&self) -> Vec<&StudentResult> {
        let mut ranked: Vec<&StudentResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.student_name.cmp(&b.student_name))
        });
        ranked
    }
}

/// Class-level statistics for a grade batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStatistics {
    pub total_students: usize,
    /// Set when the batch had no students.
    pub is_empty: bool,
    /// Unrounded mean score.
    pub average_score: Option<f64>,
    pub highest_score: Option<u32>,
    pub lowest_score: Option<u32>,
    /// Percentage of students at or above the pass threshold.
    pub pass_rate: Option<f64>,
    pub pass_threshold: u32,
    /// Student count per score bucket label.
    pub score_distribution: BTreeMap<String, usize>,
    pub total_questions: usize,
}

/// Per-question accuracy across a grade batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStatistic {
    pub question_number: u32,
    pub correct_answer: String,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub missing_count: usize,
    /// Percentage correct; `None` when the batch is empty.
    pub accuracy_rate: Option<f64>,
}

/// One student's results restricted to a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRollup {
    pub section: Section,
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub missing: usize,
    /// Percentage correct; `None` when the section has no questions.
    pub sub_score: Option<f64>,
}

/// Evidence for a single question handed to the qualitative analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEvidence {
    pub number: u32,
    pub section: Section,
    pub outcome: Outcome,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<String>,
}

/// Quantitative payload describing one student's performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInsight {
    pub student_name: String,
    pub score: u32,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub missing_count: usize,
    pub subjects: Vec<SubjectRollup>,
    pub evidence: Vec<QuestionEvidence>,
}

impl StudentInsight {
    pub fn subject(&self, section: Section) -> Option<&SubjectRollup> {
        self.subjects.iter().find(|s| s.section == section)
    }
}

/// Per-subject narrative returned by the qualitative analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectAbility {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub analysis: String,
}

/// Qualitative judgments about one student. Opaque to grading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitativeAnalysis {
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub subject_abilities: BTreeMap<String, SubjectAbility>,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
    #[serde(default)]
    pub error_patterns: Vec<String>,
}

/// Consumer-side summary over the question statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub average_accuracy: Option<f64>,
    /// Lowest accuracy question; ties go to the lowest number.
    pub hardest_question: Option<u32>,
    pub hardest_accuracy: Option<f64>,
    pub high_accuracy_threshold: f64,
    pub low_accuracy_threshold: f64,
    /// Questions with accuracy at or above the high threshold.
    pub high_accuracy_count: usize,
    /// Questions with accuracy below the low threshold.
    pub low_accuracy_count: usize,
}

/// Everything reported about one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    pub result: StudentResult,
    pub insight: StudentInsight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<QualitativeAnalysis>,
}

/// Metadata about a grading report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Exam title (usually the exam file name).
    pub exam_title: String,
    pub analysis_date: DateTime<Utc>,
    pub answer_set_fingerprint: String,
    /// Model used for extraction or analysis, if any call was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub max_score: u32,
    pub duration_seconds: f64,
}

/// The complete grading report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub answer_set: StandardAnswerSet,
    pub statistics: PopulationStatistics,
    /// Question statistics ascending by number.
    pub questions: Vec<QuestionStatistic>,
    pub question_summary: QuestionSummary,
    /// Students ranked by score, highest first.
    pub students: Vec<StudentReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(number: u32, section: Section, answer: &str) -> Question {
        Question {
            number,
            text: String::new(),
            options: vec![],
            correct_answer: answer.to_string(),
            section,
            passage_id: None,
        }
    }

    #[test]
    fn test_section_counts() {
        let questions = vec![
            question(1, Section::Grammar, "A"),
            question(2, Section::Grammar, "B"),
            question(3, Section::Reading, "C"),
            question(4, Section::LanguageUse, "D"),
        ];
        let counts = SectionCounts::from_questions(&questions);
        assert_eq!(counts.grammar_count, 2);
        assert_eq!(counts.reading_count, 1);
        assert_eq!(counts.language_use_count, 1);
        assert_eq!(counts.total_questions, 4);
        assert_eq!(counts.for_section(Section::Grammar), 2);
    }

    #[test]
    fn test_fingerprint_tracks_answers() {
        let a = StandardAnswerSet::from_validated(vec![question(1, Section::Grammar, "A")], vec![]);
        let b = StandardAnswerSet::from_validated(vec![question(1, Section::Grammar, "A")], vec![]);
        let c = StandardAnswerSet::from_validated(vec![question(1, Section::Grammar, "B")], vec![]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_question_lookup() {
        let set = StandardAnswerSet::from_validated(
            vec![
                question(1, Section::Grammar, "A"),
                question(5, Section::Reading, "C"),
            ],
            vec![],
        );
        assert_eq!(set.question(5).map(|q| q.correct_answer.as_str()), Some("C"));
        assert!(set.question(3).is_none());
    }

    #[test]
    fn test_student_answer_json_keys() {
        let json = r#"{"name": "Li Hua", "answers": {"1": "A", "12": "c"}}"#;
        let answer: StudentAnswer = serde_json::from_str(json).unwrap();
        assert_eq!(answer.student_name, "Li Hua");
        assert_eq!(answer.answers.get(&12).map(String::as_str), Some("c"));
        assert!(answer.answer_set_fingerprint.is_none());
    }

    #[test]
    fn test_ranked_orders_by_score() {
        let result = |name: &str, score: u32| StudentResult {
            student_name: name.to_string(),
            per_question_outcome: BTreeMap::new(),
            submitted_answers: BTreeMap::new(),
            correct_count: 0,
            wrong_count: 0,
            missing_count: 0,
            score,
        };
        let batch = GradeBatch {
            answer_set_fingerprint: String::new(),
            total_questions: 0,
            max_score: 100,
            results: vec![result("b", 70), result("a", 90), result("c", 70)],
        };
        let names: Vec<_> = batch.ranked().iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(serde_json::to_string(&Outcome::Missing).unwrap(), "\"missing\"");
        assert_eq!(
            serde_json::to_string(&Section::LanguageUse).unwrap(),
            "\"language_use\""
        );
    }
}
