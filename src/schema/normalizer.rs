//! Schema normalization.
//!
//! Flattens grammar questions and passage-nested questions into one
//! answer key ordered by question number. Duplicate numbers are an
//! extraction defect and are rejected rather than merged.

use crate::error::{GradingResult, IntegrityIssue};
use crate::models::{Passage, Question, Section, StandardAnswerSet};
use crate::schema::raw::{RawExamExtraction, RawPassage, RawQuestion, StoredAnswerSet};
use std::collections::HashMap;
use tracing::debug;

/// Normalize raw extraction output into a standard answer set.
///
/// Pure and idempotent. An input without questions yields an empty
/// set; callers decide whether that is acceptable.
pub fn normalize(raw: &RawExamExtraction) -> GradingResult<StandardAnswerSet> {
    let mut questions = Vec::with_capacity(raw.question_count());
    let mut passages = Vec::new();

    for q in &raw.grammar_questions {
        questions.push(convert_question(q, Section::Grammar, None)?);
    }

    for (section, groups) in [
        (Section::Reading, &raw.reading_questions),
        (Section::LanguageUse, &raw.language_use_questions),
    ] {
        for (index, group) in groups.iter().enumerate() {
            let passage = passage_header(group, section, index);
            for q in &group.questions {
                questions.push(convert_question(q, section, Some(&passage.id))?);
            }
            passages.push(passage);
        }
    }

    check_unique(&questions)?;
    questions.sort_by_key(|q| q.number);
    fill_passage_members(&mut passages, &questions);

    let set = StandardAnswerSet::from_validated(questions, passages);
    let counts = set.counts();
    debug!(
        "Normalized exam: {} grammar, {} reading, {} language use ({} total)",
        counts.grammar_count, counts.reading_count, counts.language_use_count, counts.total_questions
    );
    Ok(set)
}

/// Re-validate a saved (possibly hand-edited) answer key.
pub fn restore(stored: StoredAnswerSet) -> GradingResult<StandardAnswerSet> {
    let StoredAnswerSet {
        mut questions,
        mut passages,
    } = stored;

    let mut passage_sections: HashMap<&str, Section> = HashMap::new();
    for p in &passages {
        if !p.section.has_passages() {
            return Err(IntegrityIssue::PassageInWrongSection {
                passage_id: p.id.clone(),
                section: p.section.key().to_string(),
            }
            .into());
        }
        if passage_sections.insert(p.id.as_str(), p.section).is_some() {
            return Err(IntegrityIssue::DuplicatePassage {
                passage_id: p.id.clone(),
            }
            .into());
        }
    }

    for q in &mut questions {
        if q.number == 0 {
            return Err(IntegrityIssue::InvalidQuestionNumber { number: 0 }.into());
        }
        q.correct_answer = q.correct_answer.trim().to_string();
        if q.correct_answer.is_empty() {
            return Err(IntegrityIssue::EmptyCorrectAnswer { number: q.number }.into());
        }
        match (&q.passage_id, q.section.has_passages()) {
            (Some(_), false) => {
                return Err(IntegrityIssue::UnexpectedPassage {
                    number: q.number,
                    section: q.section.key().to_string(),
                }
                .into());
            }
            (Some(id), true) => {
                if passage_sections.get(id.as_str()) != Some(&q.section) {
                    return Err(IntegrityIssue::UnknownPassage {
                        number: q.number,
                        passage_id: id.clone(),
                    }
                    .into());
                }
            }
            (None, _) => {}
        }
    }

    check_unique(&questions)?;
    questions.sort_by_key(|q| q.number);
    fill_passage_members(&mut passages, &questions);

    Ok(StandardAnswerSet::from_validated(questions, passages))
}

fn passage_header(group: &RawPassage, section: Section, index: usize) -> Passage {
    let title = group
        .passage_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .unwrap_or_else(|| default_title(index));

    Passage {
        id: format!("{}-{}", section.key(), index + 1),
        section,
        title,
        body: group.passage_text.clone(),
        question_numbers: Vec::new(),
    }
}

/// "A", "B", ... "Z", then "27", "28", ...
fn default_title(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        (index + 1).to_string()
    }
}

fn convert_question(
    raw: &RawQuestion,
    section: Section,
    passage_id: Option<&str>,
) -> GradingResult<Question> {
    let number = u32::try_from(raw.question_number)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(IntegrityIssue::InvalidQuestionNumber {
            number: raw.question_number,
        })?;

    let correct_answer = raw.correct_answer.trim().to_string();
    if correct_answer.is_empty() {
        return Err(IntegrityIssue::EmptyCorrectAnswer { number }.into());
    }

    Ok(Question {
        number,
        text: raw.question_text.trim().to_string(),
        options: raw.options.iter().map(|o| o.trim().to_string()).collect(),
        correct_answer,
        section,
        passage_id: passage_id.map(String::from),
    })
}

fn location(question: &Question) -> String {
    match &question.passage_id {
        Some(id) => format!("{} passage {}", question.section.key(), id),
        None => question.section.key().to_string(),
    }
}

fn check_unique(questions: &[Question]) -> GradingResult<()> {
    let mut seen: HashMap<u32, &Question> = HashMap::with_capacity(questions.len());
    for q in questions {
        if let Some(first) = seen.insert(q.number, q) {
            return Err(IntegrityIssue::DuplicateQuestion {
                number: q.number,
                first: location(first),
                second: location(q),
            }
            .into());
        }
    }
    Ok(())
}

/// Questions are sorted, so member lists come out ascending.
fn fill_passage_members(passages: &mut [Passage], questions: &[Question]) {
    let mut members: HashMap<&str, Vec<u32>> = HashMap::new();
    for q in questions {
        if let Some(id) = &q.passage_id {
            members.entry(id.as_str()).or_default().push(q.number);
        }
    }
    for passage in passages.iter_mut() {
        passage.question_numbers = members.remove(passage.id.as_str()).unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradingError;

    fn raw_question(number: i64, answer: &str) -> RawQuestion {
        RawQuestion {
            question_number: number,
            question_text: format!("Question {}", number),
            options: vec!["A. one".into(), "B. two".into()],
            correct_answer: answer.to_string(),
        }
    }

    fn sample_exam() -> RawExamExtraction {
        RawExamExtraction {
            grammar_questions: vec![raw_question(2, "B"), raw_question(1, "A")],
            reading_questions: vec![RawPassage {
                passage_title: Some("A".into()),
                passage_text: "Reading text".into(),
                questions: vec![raw_question(4, "D"), raw_question(3, "C")],
            }],
            language_use_questions: vec![RawPassage {
                passage_title: None,
                passage_text: "Cloze ___".into(),
                questions: vec![raw_question(5, " a ")],
            }],
        }
    }

    #[test]
    fn test_normalize_flattens_and_sorts() {
        let set = normalize(&sample_exam()).unwrap();
        let numbers: Vec<u32> = set.questions().iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let counts = set.counts();
        assert_eq!(counts.grammar_count, 2);
        assert_eq!(counts.reading_count, 2);
        assert_eq!(counts.language_use_count, 1);
        assert_eq!(counts.total_questions, 5);

        assert_eq!(set.question(3).unwrap().passage_id.as_deref(), Some("reading-1"));
        assert_eq!(set.question(1).unwrap().passage_id, None);
        assert_eq!(set.question(5).unwrap().correct_answer, "a");
    }

    #[test]
    fn test_passages_track_members() {
        let set = normalize(&sample_exam()).unwrap();
        assert_eq!(set.passages().len(), 2);
        assert_eq!(set.passages()[0].question_numbers, vec![3, 4]);
        assert_eq!(set.passages()[0].title, "A");
        assert_eq!(set.passages()[1].id, "language_use-1");
        assert_eq!(set.passages()[1].title, "A");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let exam = sample_exam();
        assert_eq!(normalize(&exam).unwrap(), normalize(&exam).unwrap());
    }

    #[test]
    fn test_duplicate_across_sections() {
        let mut exam = sample_exam();
        exam.grammar_questions.push(raw_question(5, "A"));

        let err = normalize(&exam).unwrap_err();
        match err {
            GradingError::SchemaIntegrity(IntegrityIssue::DuplicateQuestion { number, .. }) => {
                assert_eq!(number, 5)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_positive_number() {
        let exam = RawExamExtraction {
            grammar_questions: vec![raw_question(0, "A")],
            ..Default::default()
        };
        assert!(matches!(
            normalize(&exam),
            Err(GradingError::SchemaIntegrity(
                IntegrityIssue::InvalidQuestionNumber { number: 0 }
            ))
        ));
    }

    #[test]
    fn test_rejects_blank_answer() {
        let exam = RawExamExtraction {
            grammar_questions: vec![raw_question(1, "  ")],
            ..Default::default()
        };
        assert!(normalize(&exam).is_err());
    }

    #[test]
    fn test_empty_input_gives_empty_set() {
        let set = normalize(&RawExamExtraction::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_restore_round_trips_saved_set() {
        let set = normalize(&sample_exam()).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let stored: StoredAnswerSet = serde_json::from_str(&json).unwrap();
        let restored = restore(stored).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn test_restore_rejects_dangling_passage() {
        let set = normalize(&sample_exam()).unwrap();
        let mut stored = StoredAnswerSet {
            questions: set.questions().to_vec(),
            passages: set.passages().to_vec(),
        };
        stored.questions[2].passage_id = Some("reading-9".into());

        assert!(matches!(
            restore(stored),
            Err(GradingError::SchemaIntegrity(IntegrityIssue::UnknownPassage { number: 3, .. }))
        ));
    }

    #[test]
    fn test_restore_rejects_grammar_passage() {
        let set = normalize(&sample_exam()).unwrap();
        let mut stored = StoredAnswerSet {
            questions: set.questions().to_vec(),
            passages: set.passages().to_vec(),
        };
        stored.questions[0].passage_id = Some("reading-1".into());

        assert!(matches!(
            restore(stored),
            Err(GradingError::SchemaIntegrity(IntegrityIssue::UnexpectedPassage { number: 1, .. }))
        ));
    }

    #[test]
    fn test_restore_rejects_grammar_section_passage() {
        let set = normalize(&sample_exam()).unwrap();
        let mut stored = StoredAnswerSet {
            questions: set.questions().to_vec(),
            passages: set.passages().to_vec(),
        };
        stored.passages[0].section = Section::Grammar;

        assert!(matches!(
            restore(stored),
            Err(GradingError::SchemaIntegrity(IntegrityIssue::PassageInWrongSection { .. }))
        ));
    }

    #[test]
    fn test_restore_rejects_duplicate_passage_id() {
        let set = normalize(&sample_exam()).unwrap();
        let mut stored = StoredAnswerSet {
            questions: set.questions().to_vec(),
            passages: set.passages().to_vec(),
        };
        let copy = stored.passages[0].clone();
        stored.passages.push(copy);

        match restore(stored) {
            Err(GradingError::SchemaIntegrity(IntegrityIssue::DuplicatePassage { passage_id })) => {
                assert_eq!(passage_id, "reading-1")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
