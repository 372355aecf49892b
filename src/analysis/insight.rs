//! Student insight composition.
//!
//! Splits one student's result by section so the qualitative analysis
//! receives correctly partitioned evidence. No judgement happens here.

use crate::models::{
    Outcome, QuestionEvidence, Section, StandardAnswerSet, StudentInsight, StudentResult,
    SubjectRollup,
};

/// Compose a student's subject rollups and per-question evidence.
///
/// Questions in the answer set without an outcome in the result are
/// treated as missing.
pub fn compose_insight(result: &StudentResult, answer_set: &StandardAnswerSet) -> StudentInsight {
    let mut subjects: Vec<SubjectRollup> = Section::ALL
        .iter()
        .map(|section| SubjectRollup {
            section: *section,
            total: 0,
            correct: 0,
            wrong: 0,
            missing: 0,
            sub_score: None,
        })
        .collect();

    let mut evidence = Vec::with_capacity(answer_set.total_questions());

    for question in answer_set.questions() {
        let outcome = result.outcome(question.number).unwrap_or(Outcome::Missing);

        if let Some(rollup) = subjects.iter_mut().find(|s| s.section == question.section) {
            rollup.total += 1;
            match outcome {
                Outcome::Correct => rollup.correct += 1,
                Outcome::Wrong => rollup.wrong += 1,
                Outcome::Missing => rollup.missing += 1,
            }
        }

        evidence.push(QuestionEvidence {
            number: question.number,
            section: question.section,
            outcome,
            correct_answer: question.correct_answer.clone(),
            submitted: result.submitted_answers.get(&question.number).cloned(),
        });
    }

    for rollup in &mut subjects {
        rollup.sub_score =
            (rollup.total > 0).then(|| rollup.correct as f64 / rollup.total as f64 * 100.0);
    }

    StudentInsight {
        student_name: result.student_name.clone(),
        score: result.score,
        correct_count: result.correct_count,
        wrong_count: result.wrong_count,
        missing_count: result.missing_count,
        subjects,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{grade_student, GradingOptions};
    use crate::models::StudentAnswer;
    use crate::schema::{normalize, RawExamExtraction, RawPassage, RawQuestion};

    fn q(number: i64, answer: &str) -> RawQuestion {
        RawQuestion {
            question_number: number,
            question_text: String::new(),
            options: vec![],
            correct_answer: answer.into(),
        }
    }

    fn exam() -> StandardAnswerSet {
        normalize(&RawExamExtraction {
            grammar_questions: vec![q(1, "A"), q(2, "B")],
            reading_questions: vec![RawPassage {
                passage_title: Some("A".into()),
                passage_text: String::new(),
                questions: vec![q(3, "C"), q(4, "D"), q(5, "A"), q(6, "B")],
            }],
            language_use_questions: vec![],
        })
        .unwrap()
    }

    #[test]
    fn test_subject_rollups() {
        let set = exam();
        let sheet = StudentAnswer::new("Li Hua")
            .with_answer(1, "A")
            .with_answer(2, "C")
            .with_answer(3, "C")
            .with_answer(4, "D")
            .with_answer(5, "A");
        let result = grade_student(&set, &sheet, &GradingOptions::default()).unwrap();

        let insight = compose_insight(&result, &set);
        assert_eq!(insight.student_name, "Li Hua");
        assert_eq!(insight.score, 67);

        let grammar = insight.subject(Section::Grammar).unwrap();
        assert_eq!((grammar.total, grammar.correct, grammar.wrong), (2, 1, 1));
        assert_eq!(grammar.sub_score, Some(50.0));

        let reading = insight.subject(Section::Reading).unwrap();
        assert_eq!((reading.correct, reading.missing), (3, 1));
        assert_eq!(reading.sub_score, Some(75.0));

        let language = insight.subject(Section::LanguageUse).unwrap();
        assert_eq!(language.total, 0);
        assert_eq!(language.sub_score, None);
    }

    #[test]
    fn test_rollups_partition_all_questions() {
        let set = exam();
        let result =
            grade_student(&set, &StudentAnswer::new("x"), &GradingOptions::default()).unwrap();
        let insight = compose_insight(&result, &set);

        let total: usize = insight.subjects.iter().map(|s| s.total).sum();
        assert_eq!(total, set.total_questions());
        assert_eq!(insight.evidence.len(), set.total_questions());
        assert!(insight.evidence.iter().all(|e| e.outcome == Outcome::Missing));
        assert!(insight.evidence.iter().all(|e| e.submitted.is_none()));
    }

    #[test]
    fn test_evidence_carries_submissions() {
        let set = exam();
        let sheet = StudentAnswer::new("y").with_answer(2, "d");
        let result = grade_student(&set, &sheet, &GradingOptions::default()).unwrap();
        let insight = compose_insight(&result, &set);

        let second = insight.evidence.iter().find(|e| e.number == 2).unwrap();
        assert_eq!(second.outcome, Outcome::Wrong);
        assert_eq!(second.submitted.as_deref(), Some("d"));
        assert_eq!(second.correct_answer, "B");
    }
}
