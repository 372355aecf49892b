//! Grading of answer sheets against the standard answer set.

pub mod engine;
pub mod matcher;

pub use engine::{grade_batch, grade_student, GradingOptions, RoundingPolicy};
