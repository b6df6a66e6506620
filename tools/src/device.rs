//! The quiz device: screen queries and input actions.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Device action future type alias.
pub type DeviceFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, DeviceError>> + Send + 'a>>;

/// Screen coordinate in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Center of the rectangle spanned by two corners.
    #[must_use]
    pub const fn center(top_left: Point, bottom_right: Point) -> Self {
        Self {
            x: (top_left.x + bottom_right.x) / 2,
            y: (top_left.y + bottom_right.y) / 2,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Screen elements the quiz flow waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    /// Button that starts the challenge quiz.
    QuizEntry,
    /// Revive or replay prompt shown after a wrong answer.
    Revive,
}

impl Landmark {
    /// On-screen labels that identify this landmark; any one matches.
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::QuizEntry => &["挑战答题"],
            Self::Revive => &["分享就能复活", "再来一局"],
        }
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuizEntry => f.write_str("quiz entry"),
            Self::Revive => f.write_str("revive prompt"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("no device connected")]
    NoDevice,
    #[error("screen dump is unusable: {0}")]
    Dump(String),
    #[error("screen has not been captured yet")]
    NotRefreshed,
    #[error("{0} not found on screen")]
    LandmarkMissing(Landmark),
    #[error("option {index} still off screen after {attempts} scrolls")]
    PositionUnresolved { index: usize, attempts: u32 },
}

/// A phone or emulator running the quiz app.
///
/// Queries read the snapshot taken by the last [`Device::refresh`]; actions
/// go to the live device.
pub trait Device: Send {
    /// Capture the current screen.
    fn refresh(&mut self) -> DeviceFut<'_, ()>;

    fn current_question_content(&self) -> Result<String, DeviceError>;

    fn current_option_texts(&self) -> Result<Vec<String>, DeviceError>;

    /// One entry per option; `None` when the option is off screen.
    fn current_option_positions(&self) -> Result<Vec<Option<Point>>, DeviceError>;

    fn has_prompt(&self, landmark: Landmark) -> Result<bool, DeviceError> {
        Ok(self.locate(landmark)?.is_some())
    }

    fn locate(&self, landmark: Landmark) -> Result<Option<Point>, DeviceError>;

    fn tap(&mut self, point: Point) -> DeviceFut<'_, ()>;

    fn scroll(&mut self, direction: Direction) -> DeviceFut<'_, ()>;

    fn back(&mut self) -> DeviceFut<'_, ()>;

    /// Release the connection. The default does nothing.
    fn close(&mut self) -> DeviceFut<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
