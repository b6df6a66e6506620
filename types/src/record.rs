//! Quiz question records and their flat serialized form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::RecordId;
use crate::letter::{Exclusions, InvalidLetter, OptionLetter};
use crate::text::{OPTION_SEPARATOR, normalize_content, sanitize_option, truncate_with_ellipsis};

/// Smallest option list a question can carry.
pub const MIN_OPTIONS: usize = 2;

/// Kind of quiz a question was seen in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Sequential "one life" challenge quiz.
    #[default]
    #[serde(alias = "挑战题")]
    Challenge,
    #[serde(alias = "单选题", alias = "radio")]
    Single,
    #[serde(alias = "多选题", alias = "check")]
    Multiple,
    #[serde(alias = "填空题")]
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 4] = [Self::Challenge, Self::Single, Self::Multiple, Self::Blank];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Challenge => "challenge",
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Blank => "blank",
        }
    }

    /// Label shown by the quiz app itself.
    #[must_use]
    pub const fn display_label(self) -> &'static str {
        match self {
            Self::Challenge => "挑战题",
            Self::Single => "单选题",
            Self::Multiple => "多选题",
            Self::Blank => "填空题",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.display_label() == s)
            .or(match s {
                "radio" => Some(Self::Single),
                "check" => Some(Self::Multiple),
                _ => None,
            })
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("question content is empty")]
    EmptyContent,
    #[error("question has {count} options; expected {} to {}", MIN_OPTIONS, OptionLetter::MAX_OPTIONS)]
    OptionCount { count: usize },
    #[error(transparent)]
    Letter(#[from] InvalidLetter),
    #[error("answer {letter} is outside the {count} available options")]
    AnswerOutOfRange { letter: OptionLetter, count: usize },
}

/// One quiz item and what is known about its answer.
///
/// Two records are equal iff their normalized content is equal; category,
/// answer and negative knowledge do not take part in identity.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    id: Option<RecordId>,
    category: Category,
    content: String,
    options: Vec<String>,
    answer: Option<OptionLetter>,
    note: Exclusions,
}

impl QuestionRecord {
    /// Build a record from raw on-screen text.
    ///
    /// Content is normalized and option labels are made separator-safe.
    pub fn new(
        category: Category,
        content: &str,
        options: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self, RecordError> {
        let content = normalize_content(content);
        if content.is_empty() {
            return Err(RecordError::EmptyContent);
        }
        let options: Vec<String> = options
            .into_iter()
            .map(|o| sanitize_option(o.as_ref()))
            .collect();
        if !(MIN_OPTIONS..=OptionLetter::MAX_OPTIONS).contains(&options.len()) {
            return Err(RecordError::OptionCount {
                count: options.len(),
            });
        }
        Ok(Self {
            id: None,
            category,
            content,
            options,
            answer: None,
            note: Exclusions::new(),
        })
    }

    pub fn with_answer(mut self, letter: OptionLetter) -> Result<Self, RecordError> {
        self.check_letter(letter)?;
        self.answer = Some(letter);
        Ok(self)
    }

    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: Exclusions) -> Self {
        self.note = note;
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, letter: OptionLetter) -> Option<&str> {
        self.options.get(letter.index()).map(String::as_str)
    }

    pub fn letters(&self) -> impl Iterator<Item = OptionLetter> {
        OptionLetter::for_count(self.options.len())
    }

    #[must_use]
    pub fn answer(&self) -> Option<OptionLetter> {
        self.answer
    }

    #[must_use]
    pub fn note(&self) -> &Exclusions {
        &self.note
    }

    /// Record a letter confirmed wrong. Returns `true` if it was new.
    pub fn exclude(&mut self, letter: OptionLetter) -> bool {
        self.note.insert(letter)
    }

    /// Fill in a confirmed answer, keeping the accumulated wrong letters.
    pub fn confirm(&mut self, letter: OptionLetter) -> Result<(), RecordError> {
        self.check_letter(letter)?;
        self.answer = Some(letter);
        Ok(())
    }

    /// A record with wrong letters but no confirmed answer.
    #[must_use]
    pub fn is_negative_only(&self) -> bool {
        self.answer.is_none()
    }

    /// Options joined with the separator, as stored on disk.
    #[must_use]
    pub fn joined_options(&self) -> String {
        self.options.join(&OPTION_SEPARATOR.to_string())
    }

    #[must_use]
    pub fn to_row(&self) -> RecordRow {
        RecordRow {
            id: self.id.map(RecordId::value),
            category: self.category,
            content: self.content.clone(),
            options: self.joined_options(),
            answer: self.answer.map(String::from).unwrap_or_default(),
            note: self.note.to_string(),
        }
    }

    fn check_letter(&self, letter: OptionLetter) -> Result<(), RecordError> {
        if letter.index() < self.options.len() {
            Ok(())
        } else {
            Err(RecordError::AnswerOutOfRange {
                letter,
                count: self.options.len(),
            })
        }
    }
}

impl PartialEq for QuestionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for QuestionRecord {}

impl fmt::Display for QuestionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        writeln!(f, "I: {id} {}", self.category)?;
        writeln!(f, "Q: {}", truncate_with_ellipsis(&self.content, 45))?;
        writeln!(f, "O: {}", self.joined_options())?;
        match self.answer {
            Some(letter) => write!(f, "A: {letter}"),
            None => write!(f, "A: ? (wrong: {})", self.note),
        }
    }
}

/// Flat field mapping used by the ledger file and bulk transfer formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "catagory")]
    pub category: Category,
    pub content: String,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub note: String,
}

impl TryFrom<RecordRow> for QuestionRecord {
    type Error = RecordError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let mut record = QuestionRecord::new(
            row.category,
            &row.content,
            row.options.split(OPTION_SEPARATOR),
        )?;
        if let Some(id) = row.id {
            record.id = Some(RecordId::new(id));
        }
        if !row.answer.trim().is_empty() {
            record.confirm(row.answer.parse()?)?;
        }
        record.note = row.note.parse()?;
        Ok(record)
    }
}

impl From<&QuestionRecord> for RecordRow {
    fn from(record: &QuestionRecord) -> Self {
        record.to_row()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuestionRecord {
        QuestionRecord::new(
            Category::Challenge,
            "中国最长的河流是？（出题单位：地理部）",
            ["长江", "黄河", "珠江|西江", "淮河"],
        )
        .unwrap()
    }

    #[test]
    fn new_normalizes_content_and_options() {
        let record = sample();
        assert_eq!(record.content(), "中国最长的河流是？");
        assert_eq!(record.options()[2], "珠江_西江");
        assert!(record.is_negative_only());
    }

    #[test]
    fn equality_ignores_category_and_answer() {
        let a = sample().with_answer(OptionLetter::A).unwrap();
        let mut b = sample();
        b.category = Category::Single;
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_option_counts() {
        let err = QuestionRecord::new(Category::Challenge, "q", ["only"]).unwrap_err();
        assert_eq!(err, RecordError::OptionCount { count: 1 });
        let err =
            QuestionRecord::new(Category::Challenge, "q", ["a", "b", "c", "d", "e"]).unwrap_err();
        assert_eq!(err, RecordError::OptionCount { count: 5 });
    }

    #[test]
    fn rejects_answer_beyond_options() {
        let record = QuestionRecord::new(Category::Challenge, "q", ["yes", "no"]).unwrap();
        assert!(matches!(
            record.with_answer(OptionLetter::C),
            Err(RecordError::AnswerOutOfRange { .. })
        ));
    }

    #[test]
    fn row_conversion_preserves_fields() {
        let mut record = sample().with_id(RecordId::new(7));
        record.exclude(OptionLetter::C);
        record.exclude(OptionLetter::B);
        record.confirm(OptionLetter::A).unwrap();

        let row = record.to_row();
        assert_eq!(row.options, "长江|黄河|珠江_西江|淮河");
        assert_eq!(row.answer, "A");
        assert_eq!(row.note, "CB");

        let back = QuestionRecord::try_from(row).unwrap();
        assert_eq!(back.id(), Some(RecordId::new(7)));
        assert_eq!(back.answer(), Some(OptionLetter::A));
        assert_eq!(back.note().to_string(), "CB");
        assert_eq!(back.options(), record.options());
    }

    #[test]
    fn row_accepts_legacy_keys_and_labels() {
        let json = r#"{"id": 3, "catagory": "挑战题", "content": "q?", "options": "x|y", "answer": "b", "note": ""}"#;
        let row: RecordRow = serde_json::from_str(json).unwrap();
        let record = QuestionRecord::try_from(row).unwrap();
        assert_eq!(record.category(), Category::Challenge);
        assert_eq!(record.answer(), Some(OptionLetter::B));
    }

    #[test]
    fn category_parses_both_label_styles() {
        assert_eq!("single".parse::<Category>().unwrap(), Category::Single);
        assert_eq!("填空题".parse::<Category>().unwrap(), Category::Blank);
        assert_eq!("radio".parse::<Category>().unwrap(), Category::Single);
        assert!("essay".parse::<Category>().is_err());
    }
}
