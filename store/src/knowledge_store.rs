//! Knowledge Store - persistent cache of confirmed question/answer pairs.
//!
//! Records are keyed by normalized content within a category. Every insert
//! runs in its own transaction and is durable on return (`synchronous=FULL`);
//! a failed insert never leaves a partial row behind.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, Row, Transaction, params, params_from_iter};
use tracing::{debug, info, warn};

use quizbot_types::{Category, QuestionRecord, RecordId, RecordRow};

use crate::sqlite_util::{apply_pragmas, open_secure_db};

/// Result of [`KnowledgeStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was new and now has this identifier.
    Inserted(RecordId),
    /// A record with the same content already existed in the category.
    AlreadyKnown(RecordId),
}

impl InsertOutcome {
    #[must_use]
    pub fn id(self) -> RecordId {
        match self {
            Self::Inserted(id) | Self::AlreadyKnown(id) => id,
        }
    }

    #[must_use]
    pub fn is_new(self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Counts from a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    /// Records without a confirmed answer, which the store never holds.
    pub unanswered: usize,
    /// Source rows that never became records (see [`crate::Imported`]).
    pub rejected: usize,
}

/// Persistent, deduplicated cache of confirmed question records.
pub struct KnowledgeStore {
    db: Connection,
}

impl KnowledgeStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS banks (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            content TEXT NOT NULL,
            options TEXT NOT NULL,
            answer TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_banks_category_content
        ON banks(category, content);

        CREATE INDEX IF NOT EXISTS idx_banks_content
        ON banks(content);
    ";

    const COLUMNS: &'static str = "id, category, content, options, answer, note";

    /// Open or create the store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = open_secure_db(path)
            .with_context(|| format!("Failed to open knowledge store at {}", path.display()))?;
        Self::initialize(db)
    }

    /// Open an existing store without write access.
    ///
    /// Lookups and exports work as usual; any insert fails.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open knowledge store at {} read-only", path.display()))?;
        Ok(Self { db })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory store")?;
        apply_pragmas(&db)?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create knowledge store schema")?;
        Ok(Self { db })
    }

    /// Find the record with exactly this normalized content in any of `categories`.
    pub fn lookup(&self, content: &str, categories: &[Category]) -> Result<Option<QuestionRecord>> {
        let mut found = select_by_content(&self.db, content, categories)?;
        if found.len() > 1 {
            warn!(
                content,
                matches = found.len(),
                "Content matched in several categories; using the oldest record"
            );
        }
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Persist a confirmed record unless its content is already known in its category.
    pub fn insert(&mut self, record: &QuestionRecord) -> Result<InsertOutcome> {
        if record.answer().is_none() {
            bail!(
                "Refusing to store a record without a confirmed answer: {}",
                record.content()
            );
        }

        let tx = self
            .db
            .transaction()
            .context("Failed to start knowledge store transaction")?;

        if let Some(existing) = select_by_content(&tx, record.content(), &[record.category()])?
            .into_iter()
            .find_map(|r| r.id())
        {
            info!(content = record.content(), id = %existing, "Record already stored; skipping insert");
            return Ok(InsertOutcome::AlreadyKnown(existing));
        }

        let id = insert_row(&tx, &record.to_row())?;
        tx.commit()
            .context("Failed to commit knowledge store transaction")?;

        info!(content = record.content(), %id, "Stored new confirmed record");
        Ok(InsertOutcome::Inserted(id))
    }

    /// Insert every answered record, skipping ones already known.
    pub fn import(&mut self, records: &[QuestionRecord]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for record in records {
            if record.answer().is_none() {
                summary.unanswered += 1;
                continue;
            }
            if self.insert(record)?.is_new() {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        Ok(summary)
    }

    /// All records in `categories`, oldest first.
    pub fn export_all(&self, categories: &[Category]) -> Result<Vec<QuestionRecord>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM banks WHERE category IN ({}) ORDER BY id ASC",
            Self::COLUMNS,
            placeholders(1, categories.len())
        );
        let mut stmt = self
            .db
            .prepare(&sql)
            .context("Failed to prepare export query")?;
        let rows = stmt
            .query_map(params_from_iter(categories.iter().map(|c| c.as_str())), read_row)
            .context("Failed to query records")?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.context("Failed to read record row")?;
            if let Some(record) = decode(row) {
                records.push(record);
            }
        }
        debug!(count = records.len(), "Exported records");
        Ok(records)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.db
            .query_row("SELECT COUNT(*) FROM banks", [], |row| row.get::<_, i64>(0))
            .map_or(0, |n| usize::try_from(n).unwrap_or(0))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_by_content(
    db: &Connection,
    content: &str,
    categories: &[Category],
) -> Result<Vec<QuestionRecord>> {
    if categories.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM banks WHERE content = ?1 AND category IN ({}) ORDER BY id ASC",
        KnowledgeStore::COLUMNS,
        placeholders(2, categories.len())
    );
    let mut stmt = db.prepare(&sql).context("Failed to prepare lookup query")?;
    let args = std::iter::once(content).chain(categories.iter().map(|c| c.as_str()));
    let rows = stmt
        .query_map(params_from_iter(args), read_row)
        .context("Failed to execute lookup query")?;

    let mut records = Vec::new();
    for row in rows {
        let row = row.context("Failed to read lookup result")?;
        if let Some(record) = decode(row) {
            records.push(record);
        }
    }
    Ok(records)
}

fn insert_row(tx: &Transaction<'_>, row: &RecordRow) -> Result<RecordId> {
    let created_at = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO banks (category, content, options, answer, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.category.as_str(),
            &row.content,
            &row.options,
            &row.answer,
            &row.note,
            &created_at
        ],
    )
    .context("Failed to insert record")?;
    Ok(RecordId::new(tx.last_insert_rowid()))
}

/// `(id, category, content, options, answer, note)` as stored.
type StoredRow = (i64, String, String, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

/// Convert a raw row, logging and skipping rows that no longer parse.
fn decode((id, category, content, options, answer, note): StoredRow) -> Option<QuestionRecord> {
    let category = match category.parse() {
        Ok(category) => category,
        Err(e) => {
            warn!(id, "Skipping stored record: {e}");
            return None;
        }
    };
    let row = RecordRow {
        id: Some(id),
        category,
        content,
        options,
        answer,
        note,
    };
    match QuestionRecord::try_from(row) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(id, "Skipping stored record: {e}");
            None
        }
    }
}
