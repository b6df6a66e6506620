//! Scratch ledger - provisional, session-spanning record of wrong answers.
//!
//! The ledger lives in memory for the whole run and is written back as a JSON
//! array of [`RecordRow`] at round boundaries. Losing it only costs negative
//! knowledge, so loading never fails.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use quizbot_types::{OptionLetter, QuestionRecord, RecordError, RecordRow};

use crate::atomic_write::{PersistMode, atomic_write, recover_bak_file};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write ledger {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Working set of provisional records, keyed by normalized content.
#[derive(Debug)]
pub struct ScratchLedger {
    path: PathBuf,
    entries: Vec<QuestionRecord>,
}

impl ScratchLedger {
    /// An empty ledger that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Read the ledger at `path`.
    ///
    /// A missing or unreadable file yields an empty ledger. Rows that fail to
    /// convert are skipped individually.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut ledger = Self::new(path);
        recover_bak_file(&ledger.path);

        let raw = match std::fs::read_to_string(&ledger.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %ledger.path.display(), "No ledger file yet; starting empty");
                return ledger;
            }
            Err(e) => {
                warn!(path = %ledger.path.display(), "Failed to read ledger; starting empty: {e}");
                return ledger;
            }
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %ledger.path.display(), "Ledger is not a JSON array; starting empty: {e}");
                return ledger;
            }
        };

        for (index, value) in values.into_iter().enumerate() {
            let record = serde_json::from_value::<RecordRow>(value)
                .map_err(|e| e.to_string())
                .and_then(|row| QuestionRecord::try_from(row).map_err(|e| e.to_string()));
            match record {
                Ok(record) => ledger.merge(record),
                Err(e) => warn!(path = %ledger.path.display(), index, "Skipping ledger row: {e}"),
            }
        }

        debug!(path = %ledger.path.display(), entries = ledger.entries.len(), "Loaded ledger");
        ledger
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn entries(&self) -> &[QuestionRecord] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find_by_content(&self, content: &str) -> Option<&QuestionRecord> {
        self.entries.iter().find(|r| r.content() == content)
    }

    fn find_mut(&mut self, content: &str) -> Option<&mut QuestionRecord> {
        self.entries.iter_mut().find(|r| r.content() == content)
    }

    /// Note that `letter` was wrong for the presented question.
    ///
    /// A new entry keeps the record's category and options but none of its
    /// answer or id.
    pub fn record_failure(
        &mut self,
        record: &QuestionRecord,
        letter: OptionLetter,
    ) -> Result<(), RecordError> {
        if let Some(existing) = self.find_mut(record.content()) {
            if !existing.exclude(letter) {
                debug!(content = existing.content(), %letter, "Letter already excluded");
            }
            return Ok(());
        }
        let mut fresh = QuestionRecord::new(record.category(), record.content(), record.options())?;
        fresh.exclude(letter);
        self.entries.push(fresh);
        Ok(())
    }

    /// Add a confirmed record, filling in the answer of an existing entry.
    pub fn record_success(&mut self, record: &QuestionRecord) -> Result<(), RecordError> {
        let Some(letter) = record.answer() else {
            warn!(content = record.content(), "Ignoring success without an answer");
            return Ok(());
        };
        match self.find_mut(record.content()) {
            Some(existing) => existing.confirm(letter),
            None => {
                self.entries.push(record.clone());
                Ok(())
            }
        }
    }

    /// Replace the backing file with the current working set.
    pub fn dump(&self) -> Result<(), LedgerError> {
        let rows: Vec<RecordRow> = self.entries.iter().map(RecordRow::from).collect();
        let json = serde_json::to_vec_pretty(&rows)?;
        atomic_write(&self.path, &json, PersistMode::OwnerOnly).map_err(|source| {
            LedgerError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        debug!(path = %self.path.display(), entries = rows.len(), "Wrote ledger");
        Ok(())
    }

    fn merge(&mut self, record: QuestionRecord) {
        let Some(existing) = self.find_mut(record.content()) else {
            self.entries.push(record);
            return;
        };
        for letter in record.note().iter() {
            existing.exclude(letter);
        }
        if existing.answer().is_none()
            && let Some(letter) = record.answer()
            && existing.confirm(letter).is_err()
        {
            warn!(content = record.content(), %letter, "Dropping conflicting ledger answer");
        }
    }
}
