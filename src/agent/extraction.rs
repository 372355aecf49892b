//! Model-backed extraction of exams and answer sheets.
//!
//! The model only turns unstructured text into the raw JSON shapes; all
//! validation happens in the loader and the normalizer afterwards.

use crate::agent::client::OllamaClient;
use crate::loader::{parse_answer_sheet_json, parse_exam_json};
use crate::models::StudentAnswer;
use crate::schema::RawExamExtraction;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Extract the three question collections from an exam document.
pub async fn extract_exam(client: &OllamaClient, document: &str) -> Result<RawExamExtraction> {
    info!(
        "Extracting questions from exam text ({} chars) with {}",
        document.len(),
        client.model_name()
    );

    let reply = client
        .complete(EXAM_SYSTEM_PROMPT, &build_exam_prompt(document))
        .await
        .context("Exam extraction request failed")?;
    debug!("Exam extraction reply: {} chars", reply.len());

    let raw = parse_exam_json(&reply)?;
    info!(
        "Model returned {} grammar questions, {} reading passages, {} language use passages",
        raw.grammar_questions.len(),
        raw.reading_questions.len(),
        raw.language_use_questions.len()
    );
    Ok(raw)
}

/// Extract student records from one answer sheet document.
///
/// `origin` names the source file; it is used for fallback student names.
pub async fn extract_answer_sheet(
    client: &OllamaClient,
    document: &str,
    origin: &str,
) -> Result<Vec<StudentAnswer>> {
    debug!("Extracting answer sheet {} ({} chars)", origin, document.len());

    let reply = client
        .complete(ANSWER_SHEET_SYSTEM_PROMPT, &build_answer_sheet_prompt(document))
        .await
        .with_context(|| format!("Answer sheet extraction failed for {}", origin))?;

    Ok(parse_answer_sheet_json(&reply, origin)?)
}

fn build_exam_prompt(document: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Classify the questions of the following English exam into three parts:\n\n");
    prompt.push_str("1. Grammar: standalone multiple-choice grammar questions, usually the first part.\n");
    prompt.push_str("2. Reading: reading passages, each followed by its questions.\n");
    prompt.push_str("3. Language use: cloze passages with numbered blanks (use ___ for blanks).\n\n");
    prompt.push_str("Return JSON in exactly this shape:\n");
    prompt.push_str(EXAM_JSON_SHAPE);
    prompt.push_str("\n\n=== EXAM DOCUMENT ===\n\n");
    prompt.push_str(document);
    prompt.push_str("\n\n=== END OF DOCUMENT ===\n\n");
    prompt.push_str("Return only the JSON object, no explanations.");
    prompt
}

fn build_answer_sheet_prompt(document: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Extract every student's answers from the following answer sheet.\n");
    prompt.push_str("Use the question number as the key and the chosen option letter as the value.\n");
    prompt.push_str("Leave unanswered questions out.\n\n");
    prompt.push_str("Return JSON in exactly this shape:\n");
    prompt.push_str(r#"{"students": [{"student_name": "Name", "answers": {"1": "A", "2": "C"}}]}"#);
    prompt.push_str("\n\n=== ANSWER SHEET ===\n\n");
    prompt.push_str(document);
    prompt.push_str("\n\n=== END OF ANSWER SHEET ===\n\n");
    prompt.push_str("Return only the JSON object, no explanations.");
    prompt
}

const EXAM_JSON_SHAPE: &str = r#"{
  "grammar_questions": [
    {"question_number": 1, "question_text": "...", "options": ["A. ...", "B. ...", "C. ...", "D. ..."], "correct_answer": "A"}
  ],
  "reading_questions": [
    {"passage_title": "A", "passage_text": "...", "questions": [
      {"question_number": 21, "question_text": "...", "options": ["A. ...", "B. ..."], "correct_answer": "B"}
    ]}
  ],
  "language_use_questions": [
    {"passage_text": "... ___ ...", "questions": [
      {"question_number": 29, "question_text": "", "options": ["A. study", "B. rent", "C. visit", "D. settle"], "correct_answer": "D"}
    ]}
  ]
}"#;

/// System prompt for exam extraction
const EXAM_SYSTEM_PROMPT: &str = r#"You are an assistant that digitizes English exam papers.
Copy question numbers, texts, options and correct answers exactly as printed.
Never invent questions or answers.
Only output valid JSON, no explanations or markdown."#;

/// System prompt for answer sheet extraction
const ANSWER_SHEET_SYSTEM_PROMPT: &str = r#"You are an assistant that digitizes student answer sheets.
Record each student's chosen option per question exactly as written.
Only output valid JSON, no explanations or markdown."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::client::ClientConfig;

    #[test]
    fn test_exam_prompt_embeds_document_and_shape() {
        let prompt = build_exam_prompt("1. She ___ to school every day.");
        assert!(prompt.contains("She ___ to school"));
        assert!(prompt.contains("\"grammar_questions\""));
        assert!(prompt.contains("\"language_use_questions\""));
    }

    #[test]
    fn test_answer_sheet_prompt_embeds_document() {
        let prompt = build_answer_sheet_prompt("Li Hua: 1.A 2.C");
        assert!(prompt.contains("Li Hua: 1.A 2.C"));
        assert!(prompt.contains("\"students\""));
    }

    #[test]
    fn test_exam_shape_is_parseable() {
        let raw = parse_exam_json(EXAM_JSON_SHAPE).unwrap();
        assert_eq!(raw.question_count(), 3);
    }

    #[tokio::test]
    async fn test_extraction_fails_without_server() {
        let client = OllamaClient::new(ClientConfig {
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 5,
            retries: 0,
            ..Default::default()
        })
        .unwrap();

        assert!(extract_exam(&client, "1. test").await.is_err());
        assert!(extract_answer_sheet(&client, "x", "x.txt").await.is_err());
    }
}
