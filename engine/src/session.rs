//! Quiz session state machine.
//!
//! A run plays rounds until one round answers `count` questions in a row.
//! Each question goes through
//!
//! ```text
//! Presenting -> Resolving -> Submitting -> Observing -> Presenting ...
//!                                                   \-> RoundFailed
//! ```
//!
//! and a round that reaches its target ends in `RoundSucceeded`. Wrong
//! letters are kept in the scratch ledger so later rounds avoid them;
//! confirmed answers go to the knowledge store.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use quizbot_store::{KnowledgeStore, ScratchLedger};
use quizbot_tools::{Device, DeviceError, Direction, Landmark, Point};
use quizbot_types::{Category, Exclusions, OptionLetter, QuestionRecord, RecordError};

use crate::config::Pacing;
use crate::manual::{AnswerPrompt, ManualAnswer, ask_manual_answer};
use crate::resolver::{HeuristicResolver, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Entering,
    Presenting,
    Resolving,
    Submitting,
    Observing,
    RoundSucceeded,
    RoundFailed,
}

/// Where the submitted letter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Known,
    Guessed,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A round reached the requested count.
    Succeeded,
    /// An unrecoverable collaborator error ended the run.
    Aborted { reason: String },
    /// The round cap was reached first.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub requested: u32,
    /// Consecutive correct answers in the last round played.
    pub correct: u32,
    pub rounds: u32,
    pub outcome: RunOutcome,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("knowledge store error: {0:#}")]
    Store(anyhow::Error),
    #[error("unusable question on screen: {0}")]
    Record(#[from] RecordError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Category the quiz's questions are looked up and stored under.
    pub category: Category,
    pub pacing: Pacing,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            category: Category::Challenge,
            pacing: Pacing::default(),
        }
    }
}

/// A question as shown on screen.
struct Presented {
    record: QuestionRecord,
    positions: Vec<Option<Point>>,
}

enum RoundEnd {
    Succeeded,
    Failed,
}

pub struct SessionController {
    device: Box<dyn Device>,
    resolver: HeuristicResolver,
    store: KnowledgeStore,
    ledger: ScratchLedger,
    prompt: Option<Box<dyn AnswerPrompt>>,
    options: SessionOptions,
    phase: Phase,
    streak: u32,
}

impl SessionController {
    pub fn new(
        device: Box<dyn Device>,
        resolver: HeuristicResolver,
        store: KnowledgeStore,
        ledger: ScratchLedger,
        options: SessionOptions,
    ) -> Self {
        Self {
            device,
            resolver,
            store,
            ledger,
            prompt: None,
            options,
            phase: Phase::Idle,
            streak: 0,
        }
    }

    /// Ask an operator before guessing unknown questions.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Box<dyn AnswerPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    #[must_use]
    pub fn ledger(&self) -> &ScratchLedger {
        &self.ledger
    }

    /// Release the device connection.
    pub async fn close(&mut self) {
        if let Err(e) = self.device.close().await {
            warn!("Failed to close device: {e}");
        }
    }

    /// Play rounds until one answers `count` questions in a row.
    pub async fn run(&mut self, count: u32) -> RunReport {
        let mut rounds = 0;
        let report = |rounds, correct, outcome| RunReport {
            requested: count,
            correct,
            rounds,
            outcome,
        };

        if count == 0 {
            self.phase = Phase::RoundSucceeded;
            return report(0, 0, RunOutcome::Succeeded);
        }

        loop {
            if let Some(max) = self.options.pacing.max_rounds
                && rounds >= max
            {
                warn!(rounds, "Round limit reached without success");
                self.flush_ledger();
                return report(rounds, self.streak, RunOutcome::Exhausted);
            }
            rounds += 1;
            info!(round = rounds, count, "Starting round");

            match self.play_round(count).await {
                Ok(RoundEnd::Succeeded) => {
                    info!(round = rounds, count, "Target reached");
                    pause(self.options.pacing.finish).await;
                    if let Err(e) = self.leave_quiz().await {
                        warn!("Failed to leave the quiz after success: {e}");
                    }
                    self.flush_ledger();
                    return report(rounds, self.streak, RunOutcome::Succeeded);
                }
                Ok(RoundEnd::Failed) => {
                    info!(round = rounds, correct = self.streak, "Round failed; retrying");
                    let left = self.leave_quiz().await;
                    self.flush_ledger();
                    if let Err(e) = left {
                        error!(round = rounds, "Cannot leave the quiz: {e}");
                        return report(
                            rounds,
                            self.streak,
                            RunOutcome::Aborted {
                                reason: e.to_string(),
                            },
                        );
                    }
                    pause(self.options.pacing.round_pause).await;
                }
                Err(e) => {
                    self.phase = Phase::RoundFailed;
                    error!(round = rounds, correct = self.streak, "Round aborted: {e}");
                    if let Err(back) = self.leave_quiz().await {
                        debug!("Could not leave the quiz after abort: {back}");
                    }
                    self.flush_ledger();
                    return report(
                        rounds,
                        self.streak,
                        RunOutcome::Aborted {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    async fn play_round(&mut self, count: u32) -> Result<RoundEnd, SessionError> {
        self.streak = 0;
        self.enter().await?;

        while self.streak < count {
            let presented = self.present().await?;
            let (letter, source) = self.resolve(&presented.record).await?;
            self.submit(letter, presented.positions).await?;
            if !self.observe(&presented.record, letter, source).await? {
                self.phase = Phase::RoundFailed;
                return Ok(RoundEnd::Failed);
            }
            self.streak += 1;
            debug!(correct = self.streak, count, "Answer accepted");
        }

        self.phase = Phase::RoundSucceeded;
        Ok(RoundEnd::Succeeded)
    }

    async fn enter(&mut self) -> Result<(), SessionError> {
        self.phase = Phase::Entering;
        self.device.refresh().await?;
        let entry = self
            .device
            .locate(Landmark::QuizEntry)?
            .ok_or(DeviceError::LandmarkMissing(Landmark::QuizEntry))?;
        self.device.tap(entry).await?;
        pause(self.options.pacing.settle).await;
        Ok(())
    }

    async fn present(&mut self) -> Result<Presented, SessionError> {
        self.phase = Phase::Presenting;
        self.device.refresh().await?;
        let content = self.device.current_question_content()?;
        let texts = self.device.current_option_texts()?;
        let positions = self.device.current_option_positions()?;
        let record = QuestionRecord::new(self.options.category, &content, &texts)?;
        Ok(Presented { record, positions })
    }

    async fn resolve(
        &mut self,
        record: &QuestionRecord,
    ) -> Result<(OptionLetter, AnswerSource), SessionError> {
        self.phase = Phase::Resolving;

        let exclusions = self
            .ledger
            .find_by_content(record.content())
            .map(|entry| entry.note().clone())
            .unwrap_or_else(Exclusions::new);

        let cached = self
            .store
            .lookup(record.content(), &[self.options.category])
            .map_err(SessionError::Store)?;
        if let Some(cached) = cached {
            match cached.answer() {
                Some(letter) if exclusions.contains(letter) => warn!(
                    content = record.content(),
                    %letter,
                    "Stored answer already failed this question; treating as unknown"
                ),
                Some(letter) if letter.index() < record.options().len() => {
                    let delay = known_answer_delay(&self.options.pacing);
                    info!(
                        content = record.content(),
                        %letter,
                        delay_ms = delay.as_millis() as u64,
                        "Submitting known answer"
                    );
                    pause(delay).await;
                    return Ok((letter, AnswerSource::Known));
                }
                answer => warn!(
                    content = record.content(),
                    answer = ?answer,
                    options = record.options().len(),
                    "Stored answer does not fit the options on screen; treating as unknown"
                ),
            }
        }

        if let Some(prompt) = self.prompt.as_deref_mut() {
            match ask_manual_answer(prompt, record).await {
                ManualAnswer::Letter(letter) => {
                    info!(content = record.content(), %letter, "Submitting operator answer");
                    return Ok((letter, AnswerSource::Manual));
                }
                ManualAnswer::Skip => debug!("Operator skipped; guessing"),
            }
        }

        let letter = self
            .resolver
            .infer(record.content(), record.options(), &exclusions)
            .await?;
        Ok((letter, AnswerSource::Guessed))
    }

    async fn submit(
        &mut self,
        letter: OptionLetter,
        mut positions: Vec<Option<Point>>,
    ) -> Result<(), SessionError> {
        self.phase = Phase::Submitting;
        let index = letter.index();
        let max_attempts = self.options.pacing.max_scroll_attempts;
        let mut attempts = 0;

        let point = loop {
            if let Some(point) = positions.get(index).copied().flatten() {
                break point;
            }
            if attempts >= max_attempts {
                return Err(DeviceError::PositionUnresolved { index, attempts }.into());
            }
            attempts += 1;
            debug!(%letter, attempts, "Option off screen; scrolling");
            self.device.scroll(Direction::Up).await?;
            self.device.refresh().await?;
            positions = self.device.current_option_positions()?;
        };

        debug!(%letter, %point, "Tapping option");
        self.device.tap(point).await?;
        Ok(())
    }

    /// Returns whether the submitted letter was accepted.
    async fn observe(
        &mut self,
        record: &QuestionRecord,
        letter: OptionLetter,
        source: AnswerSource,
    ) -> Result<bool, SessionError> {
        self.phase = Phase::Observing;
        pause(self.options.pacing.observe).await;
        self.device.refresh().await?;

        if self.device.has_prompt(Landmark::Revive)? {
            warn!(content = record.content(), %letter, ?source, "Answer was wrong");
            self.ledger.record_failure(record, letter)?;
            return Ok(false);
        }

        if source != AnswerSource::Known {
            let mut confirmed = record.clone();
            confirmed.confirm(letter)?;
            self.store
                .insert(&confirmed)
                .map_err(SessionError::Store)?;
            self.ledger.record_success(&confirmed)?;
        }
        info!(content = record.content(), %letter, ?source, "Answer was right");
        Ok(true)
    }

    async fn leave_quiz(&mut self) -> Result<(), DeviceError> {
        self.device.back().await
    }

    fn flush_ledger(&self) {
        if let Err(e) = self.ledger.dump() {
            warn!(path = %self.ledger.path().display(), "Failed to write ledger: {e}");
        }
    }
}

fn known_answer_delay(pacing: &Pacing) -> Duration {
    let min = pacing.known_min.as_millis() as u64;
    let max = pacing.known_max.as_millis() as u64;
    if max > min {
        Duration::from_millis(rand::random_range(min..=max))
    } else {
        pacing.known_min
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_delay_stays_in_range() {
        let pacing = Pacing {
            known_min: Duration::from_millis(10),
            known_max: Duration::from_millis(20),
            ..Pacing::immediate()
        };
        for _ in 0..50 {
            let delay = known_answer_delay(&pacing);
            assert!(delay >= pacing.known_min && delay <= pacing.known_max);
        }
    }

    #[test]
    fn inverted_known_range_uses_minimum() {
        let pacing = Pacing {
            known_min: Duration::from_millis(30),
            known_max: Duration::from_millis(5),
            ..Pacing::immediate()
        };
        assert_eq!(known_answer_delay(&pacing), Duration::from_millis(30));
    }

    #[test]
    fn report_success_flag() {
        let report = RunReport {
            requested: 3,
            correct: 3,
            rounds: 2,
            outcome: RunOutcome::Succeeded,
        };
        assert!(report.succeeded());
        let aborted = RunReport {
            outcome: RunOutcome::Aborted {
                reason: "x".to_string(),
            },
            ..report
        };
        assert!(!aborted.succeeded());
    }
}
