//! Heuristic answer selection for questions the store does not know.

use std::cmp::Reverse;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use quizbot_tools::{Cue, Notifier, RankingSignal, SignalError};
use quizbot_types::{Exclusions, OptionLetter};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ranking signal unavailable: {0}")]
    Signal(#[from] SignalError),
    #[error("question has no options to rank")]
    NoOptions,
}

/// Pick the best-scored letter not yet known to be wrong.
///
/// Options are ordered by score, highest first, ties keeping their on-screen
/// order. When every option is excluded the top-scored one is returned anyway.
/// Returns `None` only for an empty score list.
#[must_use]
pub fn rank_options(scores: &[u32], exclusions: &Exclusions) -> Option<OptionLetter> {
    let mut ranked: Vec<OptionLetter> = OptionLetter::for_count(scores.len()).collect();
    ranked.sort_by_key(|letter| Reverse(scores[letter.index()]));

    ranked
        .iter()
        .copied()
        .find(|letter| !exclusions.contains(*letter))
        .or_else(|| ranked.first().copied())
}

/// Guesses answers from a ranking signal, announcing each guess.
pub struct HeuristicResolver {
    signal: Box<dyn RankingSignal>,
    notifier: Box<dyn Notifier>,
    guess_delay: Duration,
}

impl HeuristicResolver {
    pub fn new(
        signal: Box<dyn RankingSignal>,
        notifier: Box<dyn Notifier>,
        guess_delay: Duration,
    ) -> Self {
        Self {
            signal,
            notifier,
            guess_delay,
        }
    }

    pub async fn infer(
        &self,
        content: &str,
        options: &[String],
        exclusions: &Exclusions,
    ) -> Result<OptionLetter, ResolveError> {
        if options.is_empty() {
            return Err(ResolveError::NoOptions);
        }

        self.notifier.notify(Cue::Guessing);

        let scores = self.signal.score_occurrences(content, options).await?;
        if scores.len() != options.len() {
            return Err(SignalError::ScoreCount {
                expected: options.len(),
                got: scores.len(),
            }
            .into());
        }

        for ((letter, option), score) in OptionLetter::ALL.iter().zip(options).zip(&scores) {
            info!(%letter, option = option.as_str(), score, "Option score");
        }

        let letter = rank_options(&scores, exclusions).ok_or(ResolveError::NoOptions)?;
        info!(
            content,
            %letter,
            excluded = %exclusions,
            delay_ms = self.guess_delay.as_millis() as u64,
            "Submitting guessed answer"
        );
        tokio::time::sleep(self.guess_delay).await;
        Ok(letter)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use quizbot_tools::SignalFut;

    use super::*;

    fn excluded(letters: &str) -> Exclusions {
        letters.parse().expect("letters")
    }

    const SCORES: [u32; 4] = [5, 9, 2, 7];

    #[test]
    fn highest_score_wins_without_exclusions() {
        assert_eq!(rank_options(&SCORES, &Exclusions::new()), Some(OptionLetter::B));
    }

    #[test]
    fn excluded_top_falls_to_next() {
        assert_eq!(rank_options(&SCORES, &excluded("B")), Some(OptionLetter::D));
        assert_eq!(rank_options(&SCORES, &excluded("BD")), Some(OptionLetter::A));
        assert_eq!(rank_options(&SCORES, &excluded("BDA")), Some(OptionLetter::C));
    }

    #[test]
    fn all_excluded_returns_top_scored() {
        assert_eq!(rank_options(&SCORES, &excluded("ABCD")), Some(OptionLetter::B));
    }

    #[test]
    fn ties_keep_screen_order() {
        assert_eq!(rank_options(&[3, 3, 3], &Exclusions::new()), Some(OptionLetter::A));
        assert_eq!(rank_options(&[0, 4, 4], &excluded("B")), Some(OptionLetter::C));
    }

    #[test]
    fn empty_scores_rank_nothing() {
        assert_eq!(rank_options(&[], &Exclusions::new()), None);
    }

    #[test]
    fn growing_exclusions_never_pick_an_excluded_letter() {
        let mut exclusions = Exclusions::new();
        for _ in 0..SCORES.len() - 1 {
            let pick = rank_options(&SCORES, &exclusions).expect("pick");
            assert!(!exclusions.contains(pick));
            exclusions.insert(pick);
        }
        let last = rank_options(&SCORES, &exclusions).expect("pick");
        assert!(!exclusions.contains(last));
        assert_eq!(last, OptionLetter::C);
    }

    struct FixedSignal {
        scores: Vec<u32>,
        queries: Mutex<Vec<String>>,
    }

    impl RankingSignal for FixedSignal {
        fn score_occurrences<'a>(&'a self, query: &'a str, _: &'a [String]) -> SignalFut<'a> {
            self.queries.lock().unwrap().push(query.to_string());
            let scores = self.scores.clone();
            Box::pin(async move { Ok(scores) })
        }
    }

    #[derive(Default)]
    struct CountingNotifier(std::sync::Arc<AtomicUsize>);

    impl Notifier for CountingNotifier {
        fn notify(&self, _cue: Cue) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn options() -> Vec<String> {
        ["甲", "乙", "丙", "丁"].map(String::from).to_vec()
    }

    #[tokio::test]
    async fn infer_uses_signal_and_announces_guess() {
        let cues = std::sync::Arc::new(AtomicUsize::new(0));
        let resolver = HeuristicResolver::new(
            Box::new(FixedSignal {
                scores: SCORES.to_vec(),
                queries: Mutex::new(Vec::new()),
            }),
            Box::new(CountingNotifier(cues.clone())),
            Duration::ZERO,
        );

        let letter = resolver
            .infer("问题", &options(), &excluded("B"))
            .await
            .expect("infer");
        assert_eq!(letter, OptionLetter::D);
        assert_eq!(cues.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn infer_rejects_short_score_vectors() {
        let resolver = HeuristicResolver::new(
            Box::new(FixedSignal {
                scores: vec![1, 2],
                queries: Mutex::new(Vec::new()),
            }),
            Box::new(CountingNotifier::default()),
            Duration::ZERO,
        );

        let err = resolver
            .infer("问题", &options(), &Exclusions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Signal(SignalError::ScoreCount {
                expected: 4,
                got: 2
            })
        ));
    }
}
