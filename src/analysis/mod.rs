//! Analytics over a completed grade batch.
//!
//! All functions are reductions over immutable inputs and must only be
//! applied to a full batch.

pub mod insight;
pub mod population;
pub mod questions;

pub use insight::compose_insight;
pub use population::{population_statistics, ScoreBucket};
pub use questions::{question_statistics, sort_by_number, summarize_questions};
