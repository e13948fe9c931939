//! Device configuration: submission endpoint and network timings.
//!
//! Persisted at `~/.fieldreg/config.json`. A missing file yields the
//! defaults, so a fresh device works out of the box (offline, until the
//! endpoint is reachable).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};

/// Default submission endpoint; override with `fieldreg config set-endpoint`.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8730/api/registrations";

const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// `~/.fieldreg/config.json` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where registrations are submitted; also the connectivity probe target.
    pub endpoint: String,
    /// Seconds between daemon connectivity probes.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    /// Per-request timeout for submissions and probes.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_probe_interval() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// `<home>/.fieldreg/config.json`; pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".fieldreg").join("config.json")
}

impl Config {
    /// Load the device config, falling back to defaults when absent.
    pub fn load_at(home: &Path) -> Result<Self, StoreError> {
        let path = config_path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeNotFound)?;
        Self::load_at(&home)
    }

    /// Save the device config atomically.
    pub fn save_at(&self, home: &Path) -> Result<(), StoreError> {
        let path = config_path_at(home);
        let Some(dir) = path.parent() else {
            return Err(io_err(path, std::io::Error::other("invalid config path")));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    /// `save_at` convenience wrapper.
    pub fn save(&self) -> Result<(), StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeNotFound)?;
        self.save_at(&home)
    }
}
