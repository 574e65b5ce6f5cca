//! Configuration loading
//!
//! TOML-backed configuration with sensible defaults. Every field is
//! optional; an absent or unreadable file falls back to the defaults so the
//! driver can always start.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{DEFAULT_IDLE_INTERVAL_MS, DEFAULT_SAMPLE_RATE, FRAME_BLOCK};
use crate::error::{Error, Result};
use crate::protocol::PcmFormat;

/// Output driver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Requested output bit depth: "16", "24" or "32". Anything else
    /// (including absent) falls back to 32-bit.
    pub bit_depth: Option<String>,

    /// Target sample-rate table; the first entry seeds the stream before
    /// the first track announces its own rate
    pub rates: Vec<u32>,

    /// Idle sleep between empty output cycles, in milliseconds
    pub idle_interval_ms: u64,

    /// Maximum frames extracted from the shared buffer per cycle
    pub frame_block: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bit_depth: None,
            rates: Vec::new(),
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            frame_block: FRAME_BLOCK,
        }
    }
}

impl OutputConfig {
    /// Resolve the requested bit depth. Unrecognized values fall back to
    /// 32-bit silently; a missing parameter is not an error.
    pub fn pcm_format(&self) -> PcmFormat {
        match self.bit_depth.as_deref() {
            Some("16") => PcmFormat::S16Le,
            Some("24") => PcmFormat::S24_3Le,
            Some("32") | None => PcmFormat::S32Le,
            Some(other) => {
                tracing::debug!("unrecognized bit depth '{}', using 32", other);
                PcmFormat::S32Le
            }
        }
    }

    /// First configured rate, or the default when the table is empty
    pub fn initial_rate(&self) -> u32 {
        self.rates
            .first()
            .copied()
            .filter(|&rate| rate > 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load from an explicit path, or from the platform config directory
    /// when none is given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pipe-audio-out")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
