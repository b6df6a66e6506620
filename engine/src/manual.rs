//! Operator override for questions the store does not know.

use std::future::Future;
use std::io;
use std::pin::Pin;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::warn;

use quizbot_types::{OptionLetter, QuestionRecord};

/// Token that declines to answer and lets the heuristic decide.
pub const SKIP_TOKEN: char = 'N';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAnswer {
    Letter(OptionLetter),
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not one of {expected}")]
pub struct InvalidManualAnswer {
    pub input: String,
    pub expected: String,
}

/// Accepts one of the question's letters or the skip token, case-insensitively.
pub fn parse_manual_answer(
    input: &str,
    option_count: usize,
) -> Result<ManualAnswer, InvalidManualAnswer> {
    let trimmed = input.trim();
    let invalid = || InvalidManualAnswer {
        input: trimmed.to_string(),
        expected: OptionLetter::for_count(option_count)
            .map(|l| l.as_char())
            .chain(std::iter::once(SKIP_TOKEN))
            .collect(),
    };

    let mut chars = trimmed.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return Err(invalid());
    };
    if c.eq_ignore_ascii_case(&SKIP_TOKEN) {
        return Ok(ManualAnswer::Skip);
    }
    match OptionLetter::from_char(c) {
        Some(letter) if letter.index() < option_count => Ok(ManualAnswer::Letter(letter)),
        _ => Err(invalid()),
    }
}

/// Prompt future type alias. Resolves to `None` at end of input.
pub type PromptFut<'a> = Pin<Box<dyn Future<Output = io::Result<Option<String>>> + Send + 'a>>;

/// Line-oriented operator input.
pub trait AnswerPrompt: Send {
    fn read_line<'a>(&'a mut self, prompt: &'a str) -> PromptFut<'a>;
}

/// Prompts on stdout and reads stdin.
pub struct StdinPrompt {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerPrompt for StdinPrompt {
    fn read_line<'a>(&'a mut self, prompt: &'a str) -> PromptFut<'a> {
        Box::pin(async move {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(prompt.as_bytes()).await?;
            stdout.flush().await?;
            self.lines.next_line().await
        })
    }
}

fn render_question(record: &QuestionRecord) -> String {
    let mut out = format!("\n{}\n", record.content());
    for (letter, option) in record.letters().zip(record.options()) {
        out.push_str(&format!("  {letter}. {option}\n"));
    }
    out
}

/// Ask until the operator gives a valid answer.
///
/// End of input or a broken prompt counts as a skip.
pub async fn ask_manual_answer(
    prompt: &mut dyn AnswerPrompt,
    record: &QuestionRecord,
) -> ManualAnswer {
    let count = record.options().len();
    let mut message = format!("{}Answer (or {SKIP_TOKEN} to skip): ", render_question(record));
    loop {
        let line = match prompt.read_line(&message).await {
            Ok(Some(line)) => line,
            Ok(None) => return ManualAnswer::Skip,
            Err(e) => {
                warn!("Manual prompt failed; falling back to the heuristic: {e}");
                return ManualAnswer::Skip;
            }
        };
        match parse_manual_answer(&line, count) {
            Ok(answer) => return answer,
            Err(e) => message = format!("{e}. Answer (or {SKIP_TOKEN} to skip): "),
        }
    }
}
