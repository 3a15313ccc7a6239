//! Runtime configuration, loaded from an optional TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Frames sampled from the start of each video.
pub const DEFAULT_FRAME_SAMPLE_CAP: usize = 5;
/// Sample rate the speech-to-text front end works at.
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 32;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
/// Wall-clock limit for one run of an external analyzer command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// An external command plus fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// The command is killed once it runs this long.
    pub timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl CommandConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        self.command
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Thresholds for the built-in keyword text analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Probability at or above which text is labelled "scam".
    pub scam_threshold: f32,
    /// Probability at or above which text is labelled "suspicious".
    pub suspicious_threshold: f32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            scam_threshold: 0.7,
            suspicious_threshold: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the gateway listens on.
    pub bind: String,
    pub frame_sample_cap: usize,
    pub target_sample_rate: u32,
    pub subscriber_queue_capacity: usize,
    pub max_upload_bytes: usize,
    /// ffmpeg binary used to demux audio and decode frames.
    pub ffmpeg_path: String,
    /// Speech-to-text command; receives a WAV path as its last argument.
    pub transcriber: CommandConfig,
    /// Face/deepfake command; receives a PPM frame on stdin, prints JSON.
    pub frame_analyzer: CommandConfig,
    pub text: TextConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            frame_sample_cap: DEFAULT_FRAME_SAMPLE_CAP,
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ffmpeg_path: "ffmpeg".to_string(),
            transcriber: CommandConfig::default(),
            frame_analyzer: CommandConfig::default(),
            text: TextConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.frame_sample_cap == 0 {
            return Err(ConfigError::Invalid(
                "frame_sample_cap must be at least 1".to_string(),
            ));
        }
        if self.target_sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "target_sample_rate must be positive".to_string(),
            ));
        }
        if self.subscriber_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "subscriber_queue_capacity must be at least 1".to_string(),
            ));
        }

        for (name, command) in [
            ("transcriber", &self.transcriber),
            ("frame_analyzer", &self.frame_analyzer),
        ] {
            if command.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{}.timeout_secs must be at least 1",
                    name
                )));
            }
        }

        let t = &self.text;
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(t.scam_threshold) || !in_range(t.suspicious_threshold) {
            return Err(ConfigError::Invalid(
                "text thresholds must lie within [0, 1]".to_string(),
            ));
        }
        if t.suspicious_threshold > t.scam_threshold {
            return Err(ConfigError::Invalid(format!(
                "suspicious_threshold ({}) exceeds scam_threshold ({})",
                t.suspicious_threshold, t.scam_threshold
            )));
        }

        Ok(())
    }
}
