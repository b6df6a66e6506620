//! Collaborators the quiz session talks to.
//!
//! Each collaborator is a trait with one production implementation:
//! - [`Device`]: the phone or emulator, driven by [`AdbDevice`]
//! - [`RankingSignal`]: option relevance, from [`WebSearchSignal`]
//! - [`Notifier`]: operator cues, from [`SoundNotifier`]
//!
//! Async trait methods return boxed futures so the session can hold
//! collaborators as trait objects.

mod adb;
mod alarm;
mod device;
mod signal;
mod ui_dump;

pub use adb::{AdbConfig, AdbDevice, ScreenSize, parse_device_list, parse_screen_size, scroll_gesture};
pub use alarm::{Cue, Notifier, SilentNotifier, SoundNotifier};
pub use device::{Device, DeviceError, DeviceFut, Direction, Landmark, Point};
pub use signal::{
    RankingSignal, SignalError, SignalFut, WebSearchConfig, WebSearchSignal, count_occurrences,
    page_text,
};
pub use ui_dump::{UiSnapshot, parse_bounds};
