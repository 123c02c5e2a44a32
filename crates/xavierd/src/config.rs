//! Configuration management for xavierd.
//!
//! Loads settings from /etc/xavier/config.toml, then the user's config
//! directory, or uses defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// System-wide config file path
pub const CONFIG_PATH: &str = "/etc/xavier/config.toml";

/// Per-user config path, relative to the platform config directory
pub const USER_CONFIG_RELATIVE: &str = "xavier/config.toml";

/// Daemon behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between ping messages to the extension (0 = off)
    #[serde(default)]
    pub heartbeat_secs: u64,

    /// Stop once the speech source runs dry
    #[serde(default = "default_exit_when_source_exhausted")]
    pub exit_when_source_exhausted: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_exit_when_source_exhausted() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            heartbeat_secs: 0,
            exit_when_source_exhausted: default_exit_when_source_exhausted(),
        }
    }
}

/// Where transcripts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Fixed transcripts replayed on a timer
    Scripted,
    /// One transcript per line from a file or FIFO
    Lines,
}

impl Default for SourceKind {
    fn default() -> Self {
        SourceKind::Scripted
    }
}

/// Speech source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub source: SourceKind,

    /// Transcripts for the scripted source
    #[serde(default = "default_transcripts")]
    pub transcripts: Vec<String>,

    /// Delay before each scripted transcript
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Confidence reported when the source has none of its own
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Input path for the lines source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_transcripts() -> Vec<String> {
    vec!["scroll down".to_string()]
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_confidence() -> f64 {
    1.0 // finalized results carry no per-utterance score
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            transcripts: default_transcripts(),
            interval_ms: default_interval_ms(),
            confidence: default_confidence(),
            path: None,
        }
    }
}

/// Complete xavierd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Config {
    /// First existing config file: system-wide, then per-user.
    pub fn locate() -> Option<PathBuf> {
        let mut candidates = vec![PathBuf::from(CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(USER_CONFIG_RELATIVE));
        }
        candidates.into_iter().find(|path| path.exists())
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        let confidence = self.speech.confidence;
        if !(0.0..=1.0).contains(&confidence) {
            anyhow::bail!("speech.confidence must be within 0.0..=1.0, got {}", confidence);
        }
        if self.speech.source == SourceKind::Lines && self.speech.path.is_none() {
            anyhow::bail!("speech.source = \"lines\" requires speech.path");
        }
        Ok(())
    }

    /// Render the defaults, for seeding a config file.
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}
