//! Qualitative student analysis.
//!
//! Sends a student's quantitative insight to the model and reads back a
//! narrative. Scores are never recomputed from the narrative.

use crate::agent::client::{strip_code_fences, OllamaClient};
use crate::models::{QualitativeAnalysis, StudentInsight};
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

/// Fields the model sometimes returns as a single string.
const LIST_FIELDS: &[&str] = &[
    "strengths",
    "weaknesses",
    "improvement_suggestions",
    "error_patterns",
];

/// Ask the model for a qualitative analysis of one student.
pub async fn analyze_student(
    client: &OllamaClient,
    insight: &StudentInsight,
) -> Result<QualitativeAnalysis> {
    let prompt = build_analysis_prompt(insight)?;
    debug!("Analyzing {} ({} chars)", insight.student_name, prompt.len());

    let reply = client
        .complete(ANALYSIS_SYSTEM_PROMPT, &prompt)
        .await
        .with_context(|| format!("Analysis request failed for {}", insight.student_name))?;

    parse_analysis_response(&reply)
        .with_context(|| format!("Unusable analysis for {}", insight.student_name))
}

fn build_analysis_prompt(insight: &StudentInsight) -> Result<String> {
    let payload =
        serde_json::to_string_pretty(insight).context("Failed to serialize student insight")?;

    let mut prompt = String::new();
    prompt.push_str("Here is one student's English exam performance.\n");
    prompt.push_str("`subjects` holds per-section counts; `evidence` lists every question with ");
    prompt.push_str("its outcome, the correct answer and the student's answer.\n\n");
    prompt.push_str("```json\n");
    prompt.push_str(&payload);
    prompt.push_str("\n```\n\n");
    prompt.push_str("Return JSON in exactly this shape:\n");
    prompt.push_str(ANALYSIS_JSON_SHAPE);
    prompt.push_str("\n\nUse the section keys grammar, reading and language_use in subject_abilities.");
    Ok(prompt)
}

/// Parse a model reply into a narrative.
///
/// The reply must be a JSON object; missing fields default to empty and
/// list fields given as one string become one-element lists.
pub fn parse_analysis_response(reply: &str) -> Result<QualitativeAnalysis> {
    let value: Value =
        serde_json::from_str(strip_code_fences(reply)).context("Analysis reply is not JSON")?;

    let Value::Object(mut map) = value else {
        anyhow::bail!("Analysis reply is not a JSON object");
    };

    for field in LIST_FIELDS {
        match map.get(*field) {
            Some(Value::String(s)) => {
                let items = if s.trim().is_empty() {
                    vec![]
                } else {
                    vec![Value::String(s.trim().to_string())]
                };
                map.insert(field.to_string(), Value::Array(items));
            }
            Some(Value::Null) => {
                map.remove(*field);
            }
            _ => {}
        }
    }

    serde_json::from_value(Value::Object(map)).context("Analysis reply has unexpected field types")
}

const ANALYSIS_JSON_SHAPE: &str = r#"{
  "overall_assessment": "...",
  "strengths": ["..."],
  "weaknesses": ["..."],
  "subject_abilities": {
    "grammar": {"score": 80, "analysis": "..."},
    "reading": {"score": 75, "analysis": "..."},
    "language_use": {"score": 60, "analysis": "..."}
  },
  "improvement_suggestions": ["..."],
  "error_patterns": ["..."]
}"#;

/// System prompt for student analysis
const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an experienced English teacher reviewing a student's exam.
Base every statement on the supplied counts and per-question evidence.
Point out concrete error patterns and give actionable study advice.
Only output valid JSON, no explanations or markdown."#;
