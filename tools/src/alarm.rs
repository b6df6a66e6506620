//! Audible cues for the operator.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// The answer is unknown and is about to be guessed.
    Guessing,
}

impl Cue {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Guessing => "challenge.mp3",
        }
    }
}

/// Plays cues without blocking the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, cue: Cue);
}

/// Notifier that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _cue: Cue) {}
}

/// Plays sound files with an external player command.
#[derive(Debug, Clone)]
pub struct SoundNotifier {
    /// Player program followed by its arguments; the sound path is appended.
    player: Vec<String>,
    sounds_dir: PathBuf,
    repeat: u32,
}

impl SoundNotifier {
    #[must_use]
    pub fn new(player: Vec<String>, sounds_dir: impl Into<PathBuf>, repeat: u32) -> Self {
        Self {
            player,
            sounds_dir: sounds_dir.into(),
            repeat,
        }
    }

    fn command(&self, cue: Cue) -> Option<Command> {
        let (program, args) = self.player.split_first()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(self.sounds_dir.join(cue.file_name()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Some(cmd)
    }
}

impl Notifier for SoundNotifier {
    fn notify(&self, cue: Cue) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(?cue, "No async runtime; cue not played");
            return;
        };
        if self.player.is_empty() {
            debug!(?cue, "No player configured");
            return;
        }
        let this = self.clone();
        handle.spawn(async move {
            for _ in 0..this.repeat {
                let Some(mut cmd) = this.command(cue) else {
                    return;
                };
                match cmd.status().await {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        warn!(?cue, %status, "Sound player failed");
                        return;
                    }
                    Err(e) => {
                        warn!(?cue, "Failed to start sound player: {e}");
                        return;
                    }
                }
            }
        });
    }
}
