//! Input discovery and boundary validation.
//!
//! Exams and answer sheets arrive either as structured JSON or as raw
//! text that still needs model extraction. Everything structured is
//! validated here into the strict shapes before it reaches grading.

use crate::error::{GradingError, GradingResult};
use crate::models::StudentAnswer;
use crate::schema::{RawExamExtraction, StoredAnswerSet};
use crate::agent::client::strip_code_fences;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions read as raw text for model extraction.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Where content comes from and whether it is already structured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Json,
    Text,
}

/// A loaded input file.
#[derive(Debug, Clone)]
pub struct Source {
    /// Path relative to the input root, used in logs and fallback names.
    pub origin: String,
    pub kind: SourceKind,
    pub content: String,
}

/// Classify a path by extension. `None` for unsupported files.
fn kind_for(path: &Path, allow_any_text: bool) -> Option<SourceKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if ext == "json" {
        Some(SourceKind::Json)
    } else if allow_any_text || TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Text)
    } else {
        None
    }
}

/// Read an exam document.
pub fn read_exam(path: &Path) -> Result<Source> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read exam file: {}", path.display()))?;
    let kind = kind_for(path, true).unwrap_or(SourceKind::Text);

    Ok(Source {
        origin: path.display().to_string(),
        kind,
        content,
    })
}

/// Read a saved answer key file.
pub fn read_stored_answer_set(path: &Path) -> Result<StoredAnswerSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read answer key: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse answer key: {}", path.display()))
}

/// Collect answer sheets from a file or a directory tree.
///
/// Directories are walked recursively in sorted order; hidden entries
/// and unsupported extensions are skipped. A sheet that cannot be read
/// fails the whole load so a class is never graded short.
pub fn discover_answer_sheets(path: &Path) -> Result<Vec<Source>> {
    if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read answer sheet: {}", path.display()))?;
        return Ok(vec![Source {
            origin: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            kind: kind_for(path, true).unwrap_or(SourceKind::Text),
            content,
        }]);
    }

    let mut sources = Vec::new();
    let walker = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_path = entry.path();
        let Some(kind) = kind_for(file_path, false) else {
            debug!("Skipping unsupported file: {}", file_path.display());
            continue;
        };

        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read answer sheet: {}", file_path.display()))?;
        sources.push(Source {
            origin: relative_origin(path, file_path),
            kind,
            content,
        });
    }

    Ok(sources)
}

fn relative_origin(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

/// Parse extracted exam JSON. Zero questions is an extraction failure.
pub fn parse_exam_json(text: &str) -> GradingResult<RawExamExtraction> {
    let raw: RawExamExtraction = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| GradingError::extraction(format!("exam JSON is malformed: {}", e)))?;

    if raw.question_count() == 0 {
        return Err(GradingError::extraction("no questions were found in the exam"));
    }

    Ok(raw)
}

/// Parse answer sheet JSON into student records.
///
/// Accepts a `{"students": [...]}` roster, a bare array, or a single
/// student object. Answers may be an object keyed by question number or
/// a list of `{question_number, answer}` entries. Blank and null answers
/// mean unanswered; unparseable question numbers are dropped.
pub fn parse_answer_sheet_json(text: &str, origin: &str) -> GradingResult<Vec<StudentAnswer>> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        GradingError::extraction(format!("answer sheet {} is malformed: {}", origin, e))
    })?;

    let records = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("students") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GradingError::extraction(format!(
                    "answer sheet {}: \"students\" must be a list",
                    origin
                )))
            }
            None => vec![Value::Object(map)],
        },
        _ => {
            return Err(GradingError::extraction(format!(
                "answer sheet {} is not a JSON object or list",
                origin
            )))
        }
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| student_from_value(record, origin, index))
        .collect()
}

fn student_from_value(record: Value, origin: &str, index: usize) -> GradingResult<StudentAnswer> {
    let Value::Object(map) = record else {
        return Err(GradingError::extraction(format!(
            "answer sheet {}: record {} is not an object",
            origin,
            index + 1
        )));
    };

    let student_name = ["student_name", "name"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("{} #{}", origin, index + 1));

    let answers = match map.get("answers") {
        Some(Value::Object(entries)) => answers_from_object(entries),
        Some(Value::Array(entries)) => answers_from_list(entries),
        Some(Value::Null) | None => BTreeMap::new(),
        Some(_) => {
            return Err(GradingError::extraction(format!(
                "answer sheet {}: answers of {} are not a map or list",
                origin, student_name
            )))
        }
    };

    let answer_set_fingerprint = map
        .get("answer_set_fingerprint")
        .and_then(Value::as_str)
        .map(String::from);

    Ok(StudentAnswer {
        student_name,
        answers,
        answer_set_fingerprint,
    })
}

fn answers_from_object(entries: &Map<String, Value>) -> BTreeMap<u32, String> {
    entries
        .iter()
        .filter_map(|(key, value)| answer_entry(key.trim().parse().ok(), value))
        .collect()
}

fn answers_from_list(entries: &[Value]) -> BTreeMap<u32, String> {
    entries
        .iter()
        .filter_map(|entry| {
            let number = entry
                .get("question_number")
                .or_else(|| entry.get("number"))
                .and_then(|n| match n {
                    Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                });
            answer_entry(number, entry.get("answer").unwrap_or(&Value::Null))
        })
        .collect()
}

fn answer_entry(number: Option<u32>, value: &Value) -> Option<(u32, String)> {
    let number = number.filter(|n| *n > 0)?;
    let answer = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!answer.is_empty()).then_some((number, answer))
}
