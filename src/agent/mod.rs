//! Model-backed collaborators.
//!
//! Extraction of exams and answer sheets, and qualitative student
//! analysis, all over the Ollama chat API.

pub mod client;
pub mod extraction;
pub mod feedback;

pub use client::{ClientConfig, OllamaClient};
pub use extraction::{extract_answer_sheet, extract_exam};
pub use feedback::analyze_student;
