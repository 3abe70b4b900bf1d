//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::DEVICE_NAME;
use crate::error::{Error, Result};
use crate::retry::RetryConfig;

const APP_DIR: &str = "qn-scale";

/// Weights are always kilograms, as sent by the scale; there is no unit setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Advertised name of the scale, matched exactly.
    pub device_name: String,

    pub scan_timeout_secs: u64,

    /// How long a handshake state may wait for the scale's next frame.
    pub handshake_timeout_secs: u64,

    /// Retries for each acknowledgement write.
    pub write_retries: u32,

    /// Drop frames whose trailing checksum does not match.
    pub verify_checksum: bool,

    /// Defaults to `history.json` in the platform data directory.
    pub history_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            scan_timeout_secs: 30,
            handshake_timeout_secs: 10,
            write_retries: RetryConfig::for_write().max_retries,
            verify_checksum: false,
            history_path: None,
        }
    }
}

impl Config {
    /// `<config_dir>/qn-scale/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Loads from `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(Error::Config("device_name must not be empty".into()));
        }
        if self.scan_timeout_secs == 0 {
            return Err(Error::Config("scan_timeout_secs must be positive".into()));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(Error::Config("handshake_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn history_path(&self) -> Result<PathBuf> {
        self.history_path
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR).join("history.json")))
            .ok_or_else(|| Error::Config("no data directory; set history_path".into()))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn write_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.write_retries,
            ..RetryConfig::for_write()
        }
    }
}
