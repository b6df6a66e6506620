//! Core domain types for quizbot.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod ids;
mod letter;
mod record;
mod text;

pub use ids::RecordId;
pub use letter::{Exclusions, InvalidLetter, OptionLetter};
pub use record::{Category, MIN_OPTIONS, QuestionRecord, RecordError, RecordRow, UnknownCategory};
pub use text::{
    OPTION_SEPARATOR, SEPARATOR_SUBSTITUTE, normalize_content, sanitize_option,
    strip_attribution, truncate_with_ellipsis,
};
