//! Exam schema handling.
//!
//! Raw extraction shapes and the normalizer that turns them into a
//! validated [`StandardAnswerSet`](crate::models::StandardAnswerSet).

pub mod normalizer;
pub mod raw;

pub use normalizer::{normalize, restore};
pub use raw::{RawExamExtraction, RawPassage, RawQuestion, StoredAnswerSet};
