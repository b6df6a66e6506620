//! Bulk import and export of question records.
//!
//! Formats are picked by file extension:
//! - `.json`: array of [`RecordRow`] objects.
//! - `.tsv`: tab-separated sheet with header `id, answer, content, option_a..option_d`.
//! - `.xlsx`: export only; a `bank` worksheet with the quiz app's column titles.
//! - `.md`: export only; a numbered list plus a sibling `<stem>-grid.md` table.
//!
//! Imports skip rows that do not describe a single-answer question (multiple
//! choice answers, fill-in-the-blank rows) and count them instead of failing.

use std::fmt::{self, Write as _};
use std::io;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;
use tracing::{info, warn};

use quizbot_types::{Category, OptionLetter, QuestionRecord, RecordRow};

use crate::atomic_write::{PersistMode, atomic_write};

pub const SHEET_HEADER: [&str; 7] = [
    "id", "answer", "content", "option_a", "option_b", "option_c", "option_d",
];

/// Column titles of the exported workbook, as the quiz community's sheets use them.
pub const WORKBOOK_HEADER: [&str; 8] = [
    "序号", "答案", "题干", "选项A", "选项B", "选项C", "选项D", "说明",
];

const WORKBOOK_SHEET: &str = "bank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Import,
    Export,
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Import => "import",
            Self::Export => "export",
        })
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("unsupported file type '{extension}' for {operation}")]
    Unsupported {
        extension: String,
        operation: TransferOp,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}:{line}: {message}", path.display())]
    Sheet {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("failed to build workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    Json,
    Sheet,
    Workbook,
    Markdown,
}

impl TransferFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "tsv" => Some(Self::Sheet),
            "xlsx" => Some(Self::Workbook),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

fn unsupported(path: &Path, operation: TransferOp) -> TransferError {
    TransferError::Unsupported {
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
        operation,
    }
}

/// Records read from a bulk file.
#[derive(Debug, Default)]
pub struct Imported {
    pub records: Vec<QuestionRecord>,
    /// Rows skipped because they are not a usable single-answer question.
    pub rejected: usize,
}

impl Imported {
    fn accept(&mut self, path: &Path, position: usize, row: RecordRow) {
        match QuestionRecord::try_from(row) {
            Ok(record) => self.records.push(record),
            Err(e) => self.reject(path, position, &e),
        }
    }

    fn reject(&mut self, path: &Path, position: usize, reason: &dyn fmt::Display) {
        warn!(path = %path.display(), position, "Skipping row: {reason}");
        self.rejected += 1;
    }
}

/// Write `records` to `path` in the format its extension names.
pub fn export_records(path: &Path, records: &[QuestionRecord]) -> Result<(), TransferError> {
    match TransferFormat::from_path(path).ok_or_else(|| unsupported(path, TransferOp::Export))? {
        TransferFormat::Json => write_json(path, records),
        TransferFormat::Sheet => write_sheet(path, records),
        TransferFormat::Workbook => write_workbook(path, records),
        TransferFormat::Markdown => write_markdown(path, records),
    }?;
    info!(path = %path.display(), count = records.len(), "Exported records");
    Ok(())
}

/// Read records from `path`. Sheet rows are tagged with `category`.
pub fn import_records(path: &Path, category: Category) -> Result<Imported, TransferError> {
    let imported = match TransferFormat::from_path(path) {
        Some(TransferFormat::Json) => read_json(path),
        Some(TransferFormat::Sheet) => read_sheet(path, category),
        Some(TransferFormat::Workbook | TransferFormat::Markdown) | None => {
            Err(unsupported(path, TransferOp::Import))
        }
    }?;
    info!(
        path = %path.display(),
        count = imported.records.len(),
        rejected = imported.rejected,
        "Read records"
    );
    Ok(imported)
}

fn read_to_string(path: &Path) -> Result<String, TransferError> {
    std::fs::read_to_string(path).map_err(|source| TransferError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), TransferError> {
    atomic_write(path, bytes, PersistMode::Default).map_err(|source| TransferError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_json(path: &Path, records: &[QuestionRecord]) -> Result<(), TransferError> {
    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
    let json = serde_json::to_vec_pretty(&rows).map_err(|source| TransferError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_bytes(path, &json)
}

/// Read a JSON array of rows. Rows that do not convert are skipped.
pub fn read_json(path: &Path) -> Result<Imported, TransferError> {
    let raw = read_to_string(path)?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&raw).map_err(|source| TransferError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut imported = Imported::default();
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RecordRow>(value) {
            Ok(row) => imported.accept(path, index, row),
            Err(e) => imported.reject(path, index, &e),
        }
    }
    Ok(imported)
}

fn sheet_cell(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

pub fn write_sheet(path: &Path, records: &[QuestionRecord]) -> Result<(), TransferError> {
    let mut out = SHEET_HEADER.join("\t");
    out.push('\n');
    for record in records {
        let mut cells = vec![
            record.id().map(|id| id.to_string()).unwrap_or_default(),
            record.answer().map(String::from).unwrap_or_default(),
            sheet_cell(record.content()),
        ];
        cells.extend((0..OptionLetter::MAX_OPTIONS).map(|i| {
            record
                .options()
                .get(i)
                .map(|o| sheet_cell(o))
                .unwrap_or_default()
        }));
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    write_bytes(path, out.as_bytes())
}

/// Read a tab-separated sheet. A malformed sheet is an error; rows that are
/// well-formed but not a usable question are skipped.
pub fn read_sheet(path: &Path, category: Category) -> Result<Imported, TransferError> {
    let raw = read_to_string(path)?;
    let sheet_error = |line: usize, message: String| TransferError::Sheet {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = raw.lines().enumerate().map(|(i, l)| (i + 1, l));
    match lines.next() {
        Some((_, header)) if header.trim_end().split('\t').eq(SHEET_HEADER) => {}
        Some((line, _)) => {
            return Err(sheet_error(
                line,
                format!("expected header '{}'", SHEET_HEADER.join(" ")),
            ));
        }
        None => return Ok(Imported::default()),
    }

    let mut imported = Imported::default();
    for (line, text) in lines {
        if text.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = text.split('\t').collect();
        if cells.len() < 3 || cells.len() > SHEET_HEADER.len() {
            return Err(sheet_error(
                line,
                format!("expected 3 to {} columns, found {}", SHEET_HEADER.len(), cells.len()),
            ));
        }
        let id = match cells[0].trim() {
            "" => None,
            raw_id => Some(
                raw_id
                    .parse::<i64>()
                    .map_err(|e| sheet_error(line, format!("bad id '{raw_id}': {e}")))?,
            ),
        };
        let filled = cells[3..]
            .iter()
            .rposition(|cell| !cell.is_empty())
            .map_or(0, |last| last + 1);
        let options = &cells[3..3 + filled];
        let row = RecordRow {
            id,
            category,
            content: cells[2].to_string(),
            options: options.join("|"),
            answer: cells[1].to_string(),
            note: String::new(),
        };
        imported.accept(path, line, row);
    }
    Ok(imported)
}

/// Write an `.xlsx` workbook with one `bank` worksheet.
pub fn write_workbook(path: &Path, records: &[QuestionRecord]) -> Result<(), TransferError> {
    let xlsx_error = |source: XlsxError| TransferError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(WORKBOOK_SHEET).map_err(xlsx_error)?;
    for (col, title) in WORKBOOK_HEADER.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *title, &bold)
            .map_err(xlsx_error)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        if let Some(id) = record.id() {
            sheet
                .write_number(row, 0, id.value() as f64)
                .map_err(xlsx_error)?;
        }
        let answer = record.answer().map(String::from).unwrap_or_default();
        sheet.write_string(row, 1, answer).map_err(xlsx_error)?;
        sheet
            .write_string(row, 2, record.content())
            .map_err(xlsx_error)?;
        for (col, option) in (3u16..).zip(record.options()) {
            sheet
                .write_string(row, col, option.as_str())
                .map_err(xlsx_error)?;
        }
        if !record.note().is_empty() {
            sheet
                .write_string(row, 7, record.note().to_string())
                .map_err(xlsx_error)?;
        }
    }

    let bytes = workbook.save_to_buffer().map_err(xlsx_error)?;
    write_bytes(path, &bytes)
}

/// Escape characters Markdown would otherwise interpret inside a table cell.
fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn grid_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "records".to_string());
    path.with_file_name(format!("{stem}-grid.md"))
}

fn option_label(record: &QuestionRecord, letter: OptionLetter, text: &str) -> String {
    if record.answer() == Some(letter) {
        format!("**{text}**")
    } else {
        text.to_string()
    }
}

/// Write a numbered list with the correct option bolded, plus a grid table.
pub fn write_markdown(path: &Path, records: &[QuestionRecord]) -> Result<(), TransferError> {
    let title = format!("# 挑战答题 题库 {:>4} 题\n", records.len());

    let mut list = title.clone();
    for (position, record) in records.iter().enumerate() {
        let number = record.id().map_or(position as i64 + 1, |id| id.value());
        let answer = record.answer().map(String::from).unwrap_or_default();
        let _ = writeln!(list, "{number}. {}  *{answer}*\n", record.content());
        let options = record
            .letters()
            .zip(record.options())
            .map(|(letter, text)| format!("+ {}", option_label(record, letter, text)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let _ = writeln!(list, "{options}\n");
    }

    let mut grid = title;
    grid.push_str("|序号|答案|题干|选项A|选项B|选项C|选项D|\n");
    grid.push_str("|:--:|:--:|--------|----|----|----|----|\n");
    for (position, record) in records.iter().enumerate() {
        let number = record.id().map_or(position as i64 + 1, |id| id.value());
        let answer = record.answer().map(String::from).unwrap_or_default();
        let options = record
            .letters()
            .zip(record.options())
            .map(|(letter, text)| option_label(record, letter, &markdown_cell(text)))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(
            grid,
            "| {number} | {answer} | {} | {options} |",
            markdown_cell(record.content())
        );
    }

    if records.iter().any(|r| r.answer().is_none()) {
        warn!(path = %path.display(), "Exporting records without answers to Markdown");
    }

    write_bytes(path, list.as_bytes())?;
    write_bytes(&grid_path(path), grid.as_bytes())
}
