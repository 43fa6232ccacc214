//! Configuration file load/save.
//!
//! The config lives at `~/.wsl-port-forward.json`. A missing file is not an
//! error (defaults apply); invalid JSON is (fail fast with the path in the
//! message). `--gen-config` writes the current effective configuration back
//! to the same path.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::error::ConfigError;
use super::schema::Config;

/// Config filename inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".wsl-port-forward.json";

/// Loads and saves the JSON configuration file.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader pointing at `~/.wsl-port-forward.json`.
    pub fn new() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(Self {
            path: home.join(CONFIG_FILE_NAME),
        })
    }

    /// Create a loader with an explicit path (for testing).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// The path this loader reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, falling back to defaults if the file does not
    /// exist.
    pub fn load(&self) -> Result<Config, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let config =
                    serde_json::from_str(&contents).map_err(|source| ConfigError::ParseError {
                        path: self.path.clone(),
                        source,
                    })?;
                debug!("Loaded config from {:?}", self.path);
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {:?}, using defaults", self.path);
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::ReadError {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, contents).map_err(|source| ConfigError::WriteError {
            path: self.path.clone(),
            source,
        })?;
        debug!("Wrote config to {:?}", self.path);
        Ok(())
    }
}

/// Detect the WSL distribution's address via `hostname -I` (first token).
///
/// Returns `None` when the command fails or prints nothing; the caller
/// decides whether that is fatal.
#[must_use]
pub fn detect_wsl_ip() -> Option<String> {
    let output = Command::new("hostname").arg("-I").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8(output.stdout).ok()?;
    stdout.split_whitespace().next().map(str::to_string)
}
