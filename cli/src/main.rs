//! quizbot - plays the challenge quiz on an Android device.
//!
//! ```text
//! quizbot run -c 10 [-v]          play rounds until 10 answers in a row
//! quizbot export bank.tsv         dump the question bank
//! quizbot import bank.json        merge confirmed answers into the bank
//! ```
//!
//! The binary owns process concerns only: argument parsing, logging setup and
//! exit codes. Everything else lives in the library crates.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use quizbot_engine::{
    HeuristicResolver, QuizConfig, RunOutcome, RunReport, SessionController, SessionOptions,
    StdinPrompt,
};
use quizbot_store::{ImportSummary, KnowledgeStore, ScratchLedger, export_records, import_records};
use quizbot_tools::{AdbDevice, Notifier, SilentNotifier, SoundNotifier, WebSearchSignal};
use quizbot_types::Category;

#[derive(Parser, Debug)]
#[command(name = "quizbot", version, about = "Challenge quiz player and question bank")]
struct Cli {
    /// Config file (defaults to ~/.quizbot/config.toml)
    #[arg(long, global = true, env = "QUIZBOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play rounds until one answers COUNT questions in a row
    Run(RunArgs),
    /// Write the question bank to a .json, .tsv, .xlsx or .md file
    Export {
        path: PathBuf,
        /// Categories to export (all when omitted)
        #[arg(long = "category", value_delimiter = ',')]
        categories: Vec<Category>,
    },
    /// Merge answered records from a .json or .tsv file into the bank
    Import {
        path: PathBuf,
        /// Category for sheet rows, which carry none of their own
        #[arg(long, default_value_t = Category::Challenge)]
        category: Category,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Consecutive correct answers that end the run
    #[arg(short, long, default_value_t = 10)]
    count: u32,

    /// The device is an emulator reached over `adb connect`
    #[arg(short = 'v', long = "virtual")]
    is_virtual: bool,
}

fn init_tracing(log_dir: &Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr = fmt::layer().with_writer(std::io::stderr);
    let log_path = log_dir.join("quizbot.log");

    match open_log_file(&log_path) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::debug!(path = %log_path.display(), "Logging initialized");
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(stderr)
                .with(env_filter)
                .init();
            tracing::warn!(path = %log_path.display(), "Log file unavailable: {e:#}");
        }
    }
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<QuizConfig> {
    let config = match path {
        Some(path) => QuizConfig::load_from(path)?,
        None => QuizConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_dir());

    let result = match cli.command {
        Command::Run(args) => run_quiz(&args, &config).await,
        Command::Export { path, categories } => export_bank(&path, &categories, &config),
        Command::Import { path, category } => import_bank(&path, category, &config),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_notifier(config: &QuizConfig) -> Box<dyn Notifier> {
    let player = config.alarm_player();
    if player.is_empty() {
        Box::new(SilentNotifier)
    } else {
        Box::new(SoundNotifier::new(
            player,
            config.sounds_dir(),
            config.alarm_repeat(),
        ))
    }
}

async fn run_quiz(args: &RunArgs, config: &QuizConfig) -> Result<bool> {
    let store = KnowledgeStore::open(config.database_path())?;
    let ledger = ScratchLedger::load(config.ledger_path());
    tracing::info!(
        known = store.len(),
        noted = ledger.len(),
        ledger = %ledger.path().display(),
        "Loaded question bank"
    );

    let signal =
        WebSearchSignal::new(config.search_config()).context("Failed to build search client")?;
    let pacing = config.pacing();
    let resolver = HeuristicResolver::new(Box::new(signal), build_notifier(config), pacing.guess);

    let device = AdbDevice::connect(config.adb_config(args.is_virtual))
        .await
        .context("Failed to connect to the device")?;

    let mut session = SessionController::new(
        Box::new(device),
        resolver,
        store,
        ledger,
        SessionOptions {
            category: Category::Challenge,
            pacing,
        },
    );
    if config.manual_enabled() {
        session = session.with_prompt(Box::new(StdinPrompt::new()));
    }

    let report = session.run(args.count).await;
    session.close().await;
    print_report(&report);
    Ok(report.succeeded())
}

fn print_report(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Succeeded => println!(
            "Answered {} in a row after {} round(s).",
            report.correct, report.rounds
        ),
        RunOutcome::Exhausted => println!(
            "Gave up after {} round(s); best last round {}/{}.",
            report.rounds, report.correct, report.requested
        ),
        RunOutcome::Aborted { reason } => println!(
            "Stopped in round {} at {}/{}: {reason}",
            report.rounds, report.correct, report.requested
        ),
    }
}

fn export_bank(path: &Path, categories: &[Category], config: &QuizConfig) -> Result<bool> {
    let categories = if categories.is_empty() {
        Category::ALL.to_vec()
    } else {
        categories.to_vec()
    };
    let store = KnowledgeStore::open_read_only(config.database_path())?;
    let records = store.export_all(&categories)?;
    export_records(path, &records)
        .with_context(|| format!("Failed to export to {}", path.display()))?;
    println!("Exported {} records to {}", records.len(), path.display());
    Ok(true)
}

fn import_bank(path: &Path, category: Category, config: &QuizConfig) -> Result<bool> {
    let imported = import_records(path, category)
        .with_context(|| format!("Failed to import {}", path.display()))?;
    let mut store = KnowledgeStore::open(config.database_path())?;
    let summary = ImportSummary {
        rejected: imported.rejected,
        ..store.import(&imported.records)?
    };
    println!(
        "Imported {} new records from {} ({} already known, {} without an answer, {} unusable)",
        summary.inserted,
        path.display(),
        summary.duplicates,
        summary.unanswered,
        summary.rejected
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults_to_ten_on_a_real_device() {
        let cli = Cli::try_parse_from(["quizbot", "run"]).expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.count, 10);
        assert!(!args.is_virtual);
    }

    #[test]
    fn run_accepts_short_flags() {
        let cli = Cli::try_parse_from(["quizbot", "run", "-c", "3", "-v"]).expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.count, 3);
        assert!(args.is_virtual);
    }

    #[test]
    fn export_parses_category_list() {
        let cli = Cli::try_parse_from([
            "quizbot",
            "export",
            "bank.tsv",
            "--category",
            "challenge,single",
        ])
        .expect("parse");
        let Command::Export { path, categories } = cli.command else {
            panic!("expected export");
        };
        assert_eq!(path, PathBuf::from("bank.tsv"));
        assert_eq!(categories, vec![Category::Challenge, Category::Single]);
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(Cli::try_parse_from(["quizbot", "import", "x.json", "--category", "quiz"]).is_err());
    }
}
