//! Persistence for quizbot
//!
//! This crate provides:
//! - The knowledge store: confirmed answers in SQLite, deduplicated by content
//! - The scratch ledger: wrong letters carried across rounds in a JSON file
//! - Bulk import/export in JSON and tab-separated form, plus xlsx and Markdown export
//!
//! # Layout on disk
//!
//! ```text
//! ~/.quizbot/
//! ├── bank.sqlite    KnowledgeStore (WAL, 0o600)
//! ├── ledger.json    ScratchLedger (atomic replace, 0o600)
//! └── logs/
//! ```

mod atomic_write;
mod knowledge_store;
mod scratch_ledger;
mod sqlite_util;
mod transfer;

pub use atomic_write::{PersistMode, atomic_write, recover_bak_file};
pub use knowledge_store::{ImportSummary, InsertOutcome, KnowledgeStore};
pub use scratch_ledger::{LedgerError, ScratchLedger};
pub use transfer::{
    Imported, SHEET_HEADER, TransferError, TransferFormat, TransferOp, WORKBOOK_HEADER,
    export_records, import_records, read_json, read_sheet, write_json, write_markdown,
    write_sheet, write_workbook,
};
