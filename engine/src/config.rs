use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use quizbot_tools::{AdbConfig, WebSearchConfig};

/// Settings from `~/.quizbot/config.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuizConfig {
    pub paths: Option<PathsConfig>,
    pub device: Option<DeviceConfig>,
    pub search: Option<SearchConfig>,
    pub pacing: Option<PacingConfig>,
    pub alarm: Option<AlarmConfig>,
    pub manual: Option<ManualConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// File locations. Relative paths resolve against the data directory.
#[derive(Debug, Default, Deserialize)]
pub struct PathsConfig {
    pub data_dir: Option<String>,
    pub database: Option<String>,
    pub ledger: Option<String>,
    pub sounds: Option<String>,
    /// Where the screen dump is pulled to on this machine.
    pub ui_dump: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceConfig {
    /// Path to the `adb` binary.
    pub adb: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub serial: Option<String>,
    pub remote_dump: Option<String>,
    pub min_dump_bytes: Option<u64>,
    pub command_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub query_param: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Deliberate delays, in milliseconds, and loop bounds.
#[derive(Debug, Default, Deserialize)]
pub struct PacingConfig {
    pub settle_ms: Option<u64>,
    pub observe_ms: Option<u64>,
    pub guess_ms: Option<u64>,
    pub known_min_ms: Option<u64>,
    pub known_max_ms: Option<u64>,
    pub finish_ms: Option<u64>,
    pub round_pause_ms: Option<u64>,
    pub max_scroll_attempts: Option<u32>,
    pub max_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlarmConfig {
    /// Player command and arguments; the sound file path is appended.
    pub player: Option<Vec<String>>,
    pub repeat: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ManualConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Resolved delays and bounds for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// After tapping the quiz entry.
    pub settle: Duration,
    /// Between tapping an answer and checking the result.
    pub observe: Duration,
    /// After a guessed answer is computed.
    pub guess: Duration,
    /// Random delay range before submitting a known answer.
    pub known_min: Duration,
    pub known_max: Duration,
    /// After a round reaches its target, before leaving the quiz.
    pub finish: Duration,
    /// Between a failed round and the next one.
    pub round_pause: Duration,
    pub max_scroll_attempts: u32,
    pub max_rounds: Option<u32>,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            observe: Duration::from_millis(1500),
            guess: Duration::from_secs(5),
            known_min: Duration::ZERO,
            known_max: Duration::from_secs(5),
            finish: Duration::from_secs(30),
            round_pause: Duration::from_secs(3),
            max_scroll_attempts: 10,
            max_rounds: None,
        }
    }
}

impl Pacing {
    /// No delays at all; for tests and dry runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            observe: Duration::ZERO,
            guess: Duration::ZERO,
            known_min: Duration::ZERO,
            known_max: Duration::ZERO,
            finish: Duration::ZERO,
            round_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub const DEFAULT_ALARM_REPEAT: u32 = 1;

/// Expand `${VAR}` references from the environment. Unset variables expand to nothing.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl QuizConfig {
    /// Load from the default location. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), "Failed to read config: {err}");
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        toml::from_str(&content).map_err(|err| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {err}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    fn paths(&self) -> Option<&PathsConfig> {
        self.paths.as_ref()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.paths()
            .and_then(|p| p.data_dir.as_deref())
            .map(|dir| PathBuf::from(expand_env_vars(dir)))
            .or_else(default_data_dir)
            .unwrap_or_else(|| PathBuf::from(".quizbot"))
    }

    fn resolve(&self, configured: Option<&String>, default_name: &str) -> PathBuf {
        let data_dir = self.data_dir();
        match configured {
            Some(raw) => data_dir.join(expand_env_vars(raw)),
            None => data_dir.join(default_name),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(self.paths().and_then(|p| p.database.as_ref()), "bank.sqlite")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.resolve(self.paths().and_then(|p| p.ledger.as_ref()), "ledger.json")
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.resolve(self.paths().and_then(|p| p.sounds.as_ref()), "sounds")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn adb_config(&self, is_virtual: bool) -> AdbConfig {
        let defaults = AdbConfig::default();
        let device = self.device.as_ref();
        let local_dump_path = self.resolve(self.paths().and_then(|p| p.ui_dump.as_ref()), "ui.xml");
        AdbConfig {
            binary: device
                .and_then(|d| d.adb.as_deref())
                .map_or(defaults.binary, |adb| PathBuf::from(expand_env_vars(adb))),
            is_virtual,
            host: device
                .and_then(|d| d.host.clone())
                .unwrap_or(defaults.host),
            port: device.and_then(|d| d.port).unwrap_or(defaults.port),
            serial: device
                .and_then(|d| d.serial.as_deref())
                .map(expand_env_vars)
                .or(defaults.serial),
            remote_dump_path: device
                .and_then(|d| d.remote_dump.clone())
                .unwrap_or(defaults.remote_dump_path),
            local_dump_path,
            min_dump_bytes: device
                .and_then(|d| d.min_dump_bytes)
                .unwrap_or(defaults.min_dump_bytes),
            command_timeout: device
                .and_then(|d| d.command_timeout_secs)
                .map_or(defaults.command_timeout, Duration::from_secs),
        }
    }

    pub fn search_config(&self) -> WebSearchConfig {
        let defaults = WebSearchConfig::default();
        let search = self.search.as_ref();
        WebSearchConfig {
            base_url: search
                .and_then(|s| s.base_url.as_deref())
                .map_or(defaults.base_url, expand_env_vars),
            query_param: search
                .and_then(|s| s.query_param.clone())
                .unwrap_or(defaults.query_param),
            user_agent: search
                .and_then(|s| s.user_agent.clone())
                .unwrap_or(defaults.user_agent),
            timeout: search
                .and_then(|s| s.timeout_secs)
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }

    pub fn pacing(&self) -> Pacing {
        let defaults = Pacing::default();
        let Some(p) = self.pacing.as_ref() else {
            return defaults;
        };
        let ms = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);
        Pacing {
            settle: ms(p.settle_ms, defaults.settle),
            observe: ms(p.observe_ms, defaults.observe),
            guess: ms(p.guess_ms, defaults.guess),
            known_min: ms(p.known_min_ms, defaults.known_min),
            known_max: ms(p.known_max_ms, defaults.known_max),
            finish: ms(p.finish_ms, defaults.finish),
            round_pause: ms(p.round_pause_ms, defaults.round_pause),
            max_scroll_attempts: p.max_scroll_attempts.unwrap_or(defaults.max_scroll_attempts),
            max_rounds: p.max_rounds.or(defaults.max_rounds),
        }
    }

    /// Player command for audio cues; empty when none is configured.
    pub fn alarm_player(&self) -> Vec<String> {
        self.alarm
            .as_ref()
            .and_then(|a| a.player.as_ref())
            .map(|argv| argv.iter().map(|arg| expand_env_vars(arg)).collect())
            .unwrap_or_default()
    }

    pub fn alarm_repeat(&self) -> u32 {
        self.alarm
            .as_ref()
            .and_then(|a| a.repeat)
            .unwrap_or(DEFAULT_ALARM_REPEAT)
    }

    pub fn manual_enabled(&self) -> bool {
        self.manual.as_ref().is_some_and(|m| m.enabled)
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".quizbot"))
}

pub fn config_path() -> Option<PathBuf> {
    default_data_dir().map(|dir| dir.join("config.toml"))
}
