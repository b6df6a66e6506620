//! Quiz engine for quizbot - answer resolution and the session state machine.
//!
//! This crate wires the store and the device collaborators together. It holds
//! no terminal or process concerns; the binary builds a [`SessionController`]
//! from a [`QuizConfig`] and runs it.

mod config;
mod manual;
mod resolver;
mod session;

pub use config::{
    AlarmConfig, ConfigError, DeviceConfig, ManualConfig, Pacing, PacingConfig, PathsConfig,
    QuizConfig, SearchConfig, config_path, expand_env_vars,
};
pub use manual::{
    AnswerPrompt, InvalidManualAnswer, ManualAnswer, PromptFut, SKIP_TOKEN, StdinPrompt,
    ask_manual_answer, parse_manual_answer,
};
pub use resolver::{HeuristicResolver, ResolveError, rank_options};
pub use session::{
    AnswerSource, Phase, RunOutcome, RunReport, SessionController, SessionError, SessionOptions,
};
