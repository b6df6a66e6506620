//! Option letters and the negative-knowledge set built from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label of one answer option, in on-screen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid option letter '{0}'; expected one of A, B, C, D")]
pub struct InvalidLetter(pub String);

impl OptionLetter {
    /// Every letter in display order; position `i` labels option `i`.
    pub const ALL: [OptionLetter; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Largest number of options a question can carry.
    pub const MAX_OPTIONS: usize = Self::ALL.len();

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
        }
    }

    /// Case-insensitive parse of a single letter.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            _ => None,
        }
    }

    /// Letters that label a question with `count` options.
    pub fn for_count(count: usize) -> impl Iterator<Item = OptionLetter> {
        Self::ALL.into_iter().take(count)
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for OptionLetter {
    type Err = InvalidLetter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c).ok_or_else(|| InvalidLetter(s.to_string())),
            _ => Err(InvalidLetter(s.to_string())),
        }
    }
}

impl TryFrom<String> for OptionLetter {
    type Error = InvalidLetter;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionLetter> for String {
    fn from(value: OptionLetter) -> Self {
        value.as_char().to_string()
    }
}

/// Letters confirmed wrong for one question.
///
/// Append-only: letters are never removed, and re-adding a known letter is a
/// no-op. Serialized as the concatenated letters (e.g. `"CB"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Exclusions(Vec<OptionLetter>);

impl Exclusions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the letter was not already excluded.
    pub fn insert(&mut self, letter: OptionLetter) -> bool {
        if self.contains(letter) {
            return false;
        }
        self.0.push(letter);
        true
    }

    #[must_use]
    pub fn contains(&self, letter: OptionLetter) -> bool {
        self.0.contains(&letter)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = OptionLetter> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<OptionLetter> for Exclusions {
    fn from_iter<I: IntoIterator<Item = OptionLetter>>(iter: I) -> Self {
        let mut out = Self::new();
        for letter in iter {
            out.insert(letter);
        }
        out
    }
}

impl fmt::Display for Exclusions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in &self.0 {
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

impl FromStr for Exclusions {
    type Err = InvalidLetter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| OptionLetter::from_char(c).ok_or_else(|| InvalidLetter(c.to_string())))
            .collect()
    }
}

impl TryFrom<String> for Exclusions {
    type Error = InvalidLetter;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Exclusions> for String {
    fn from(value: Exclusions) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_letter_agree() {
        for (i, letter) in OptionLetter::ALL.iter().enumerate() {
            assert_eq!(letter.index(), i);
            assert_eq!(OptionLetter::from_index(i), Some(*letter));
        }
        assert_eq!(OptionLetter::from_index(4), None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("c".parse::<OptionLetter>().unwrap(), OptionLetter::C);
        assert!("E".parse::<OptionLetter>().is_err());
        assert!("AB".parse::<OptionLetter>().is_err());
    }

    #[test]
    fn exclusions_ignore_repeats() {
        let mut ex = Exclusions::new();
        assert!(ex.insert(OptionLetter::C));
        assert!(!ex.insert(OptionLetter::C));
        assert!(ex.insert(OptionLetter::A));
        assert_eq!(ex.to_string(), "CA");
    }

    #[test]
    fn exclusions_parse_from_note_text() {
        let ex: Exclusions = "CBC".parse().unwrap();
        assert_eq!(ex.len(), 2);
        assert!(ex.contains(OptionLetter::B));
        assert!("CX".parse::<Exclusions>().is_err());
    }

    #[test]
    fn for_count_limits_letters() {
        let letters: Vec<_> = OptionLetter::for_count(3).collect();
        assert_eq!(letters, vec![OptionLetter::A, OptionLetter::B, OptionLetter::C]);
    }
}
