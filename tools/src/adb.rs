//! Android device driven through the `adb` command line.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time;
use tracing::{debug, info, warn};

use crate::device::{Device, DeviceError, DeviceFut, Direction, Landmark, Point};
use crate::ui_dump::UiSnapshot;

const TAP_HOLD_MS: u32 = 50;
const SCROLL_DISTANCE: i32 = 100;
const SCROLL_DURATION_MS: u32 = 500;
const DUMP_ATTEMPTS: u32 = 3;
const KEYCODE_BACK: &str = "4";

#[derive(Debug, Clone)]
pub struct AdbConfig {
    pub binary: PathBuf,
    /// Connect to an emulator over TCP before use.
    pub is_virtual: bool,
    pub host: String,
    pub port: u16,
    /// Pin a device; otherwise the emulator address or the first device listed.
    pub serial: Option<String>,
    pub remote_dump_path: String,
    pub local_dump_path: PathBuf,
    /// Dumps smaller than this are retaken, up to a few times.
    pub min_dump_bytes: u64,
    pub command_timeout: Duration,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("adb"),
            is_virtual: false,
            host: "127.0.0.1".to_string(),
            port: 7555,
            serial: None,
            remote_dump_path: "/sdcard/ui.xml".to_string(),
            local_dump_path: std::env::temp_dir().join("quizbot-ui.xml"),
            min_dump_bytes: 10_240,
            command_timeout: Duration::from_secs(20),
        }
    }
}

impl AdbConfig {
    fn emulator_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Screen size in portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// Parse `wm size` output; the last reported size (override) wins.
#[must_use]
pub fn parse_screen_size(output: &str) -> Option<ScreenSize> {
    output
        .lines()
        .filter_map(|line| {
            let (_, size) = line.rsplit_once(':')?;
            let (a, b) = size.trim().split_once('x')?;
            let (a, b) = (a.trim().parse::<i32>().ok()?, b.trim().parse::<i32>().ok()?);
            Some(ScreenSize {
                width: a.min(b),
                height: a.max(b),
            })
        })
        .last()
}

/// Serials in the `device` state from `adb devices` output.
#[must_use]
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (serial, state) = line.split_once('\t')?;
            (state.trim() == "device").then(|| serial.trim().to_string())
        })
        .collect()
}

/// Start and end points of a swipe that scrolls the screen.
#[must_use]
pub fn scroll_gesture(size: ScreenSize, direction: Direction) -> (Point, Point) {
    let (w, h) = (size.width, size.height);
    match direction {
        Direction::Up => {
            let start = Point::new(w / 2, h / 3 * 2);
            (start, Point::new(start.x, start.y - SCROLL_DISTANCE))
        }
        Direction::Down => {
            let start = Point::new(w / 2, h / 3);
            (start, Point::new(start.x, start.y + SCROLL_DISTANCE))
        }
        Direction::Left => {
            let start = Point::new(w / 3 * 2, h / 2);
            (start, Point::new(start.x - SCROLL_DISTANCE, start.y))
        }
        Direction::Right => {
            let start = Point::new(w / 3, h / 2);
            (start, Point::new(start.x + SCROLL_DISTANCE, start.y))
        }
    }
}

pub struct AdbDevice {
    config: AdbConfig,
    serial: String,
    size: ScreenSize,
    snapshot: Option<UiSnapshot>,
}

impl AdbDevice {
    /// Connect (for emulators), pick a device and read its screen size.
    pub async fn connect(config: AdbConfig) -> Result<Self, DeviceError> {
        if config.is_virtual {
            let address = config.emulator_address();
            info!(%address, "Connecting to emulator");
            run_adb(&config, None, &["connect", &address]).await?;
        }

        let listing = run_adb(&config, None, &["devices"]).await?;
        let devices = parse_device_list(&listing);
        let serial = match &config.serial {
            Some(serial) => serial.clone(),
            None if config.is_virtual && devices.contains(&config.emulator_address()) => {
                config.emulator_address()
            }
            None => devices.first().cloned().ok_or(DeviceError::NoDevice)?,
        };
        info!(%serial, "Using device");

        let size_output = run_adb(&config, Some(&serial), &["shell", "wm", "size"]).await?;
        let size = parse_screen_size(&size_output).ok_or_else(|| DeviceError::Command {
            command: "wm size".to_string(),
            status: "ok".to_string(),
            stderr: format!("unrecognized output: {}", size_output.trim()),
        })?;
        debug!(width = size.width, height = size.height, "Screen size");

        Ok(Self {
            config,
            serial,
            size,
            snapshot: None,
        })
    }

    async fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        run_adb(&self.config, Some(&self.serial), &full).await
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u32) -> Result<(), DeviceError> {
        debug!(%from, %to, duration_ms, "Swipe");
        let coords = [from.x, from.y, to.x, to.y].map(|v| v.to_string());
        let duration = duration_ms.to_string();
        self.shell(&[
            "input", "swipe", &coords[0], &coords[1], &coords[2], &coords[3], &duration,
        ])
        .await
        .map(drop)
    }

    async fn capture(&self) -> Result<String, DeviceError> {
        let local = self.config.local_dump_path.to_string_lossy().into_owned();
        let mut xml = String::new();
        for attempt in 1..=DUMP_ATTEMPTS {
            self.shell(&["uiautomator", "dump", &self.config.remote_dump_path])
                .await?;
            run_adb(
                &self.config,
                Some(&self.serial),
                &["pull", &self.config.remote_dump_path, &local],
            )
            .await?;
            xml = tokio::fs::read_to_string(&self.config.local_dump_path)
                .await
                .map_err(|e| DeviceError::Dump(format!("cannot read {local}: {e}")))?;
            if xml.len() as u64 >= self.config.min_dump_bytes {
                break;
            }
            debug!(attempt, bytes = xml.len(), "Screen dump looks short; retaking");
            if attempt < DUMP_ATTEMPTS {
                time::sleep(Duration::from_secs(1)).await;
            }
        }
        Ok(xml)
    }

    fn snapshot(&self) -> Result<&UiSnapshot, DeviceError> {
        self.snapshot.as_ref().ok_or(DeviceError::NotRefreshed)
    }
}

async fn run_adb(
    config: &AdbConfig,
    serial: Option<&str>,
    args: &[&str],
) -> Result<String, DeviceError> {
    let mut cmd = Command::new(&config.binary);
    if let Some(serial) = serial {
        cmd.args(["-s", serial]);
    }
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let command = format!("adb {}", args.join(" "));
    let output = match time::timeout(config.command_timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(DeviceError::Spawn { command, source }),
        Err(_) => {
            return Err(DeviceError::Timeout {
                command,
                timeout: config.command_timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(DeviceError::Command {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl Device for AdbDevice {
    fn refresh(&mut self) -> DeviceFut<'_, ()> {
        Box::pin(async move {
            let xml = self.capture().await?;
            self.snapshot = Some(UiSnapshot::parse(&xml)?);
            Ok(())
        })
    }

    fn current_question_content(&self) -> Result<String, DeviceError> {
        self.snapshot()?.question_content().map(str::to_string)
    }

    fn current_option_texts(&self) -> Result<Vec<String>, DeviceError> {
        Ok(self.snapshot()?.option_texts().to_vec())
    }

    fn current_option_positions(&self) -> Result<Vec<Option<Point>>, DeviceError> {
        Ok(self.snapshot()?.option_positions().to_vec())
    }

    fn locate(&self, landmark: Landmark) -> Result<Option<Point>, DeviceError> {
        Ok(self.snapshot()?.locate(landmark))
    }

    fn tap(&mut self, point: Point) -> DeviceFut<'_, ()> {
        // A short press registers more reliably than `input tap` in the quiz app.
        Box::pin(async move { self.swipe(point, point, TAP_HOLD_MS).await })
    }

    fn scroll(&mut self, direction: Direction) -> DeviceFut<'_, ()> {
        Box::pin(async move {
            let (from, to) = scroll_gesture(self.size, direction);
            self.swipe(from, to, SCROLL_DURATION_MS).await
        })
    }

    fn back(&mut self) -> DeviceFut<'_, ()> {
        Box::pin(async move {
            self.shell(&["input", "keyevent", KEYCODE_BACK]).await?;
            Ok(())
        })
    }

    /// Disconnect from the emulator, if one was connected.
    fn close(&mut self) -> DeviceFut<'_, ()> {
        Box::pin(async move {
            if !self.config.is_virtual {
                return Ok(());
            }
            let address = self.config.emulator_address();
            if let Err(e) = run_adb(&self.config, None, &["disconnect", &address]).await {
                warn!(%address, "Failed to disconnect emulator: {e}");
            }
            Ok(())
        })
    }
}
