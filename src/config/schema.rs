//! Configuration schema.
//!
//! Persisted as JSON at `~/.wsl-port-forward.json`. Every key is optional in
//! the file; missing keys take their defaults, so a partial or empty config
//! file is always valid. CLI flags override file values (see
//! [`Config::apply_cli`]).

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::cli::Cli;

fn default_interval() -> f64 {
    0.5
}

fn default_windows_ip() -> String {
    "0.0.0.0".to_string()
}

/// Persistent settings for the forwarding daemon.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Seconds between reconciliation cycles in auto mode.
    #[serde(default = "default_interval")]
    pub update_interval: f64,

    /// Address netsh listens on for forwarded ports.
    #[serde(default = "default_windows_ip")]
    pub windows_ip: String,

    /// WSL address connections are relayed to. Empty means auto-detect at
    /// startup.
    #[serde(default)]
    pub wsl_ip: String,

    /// When true, sampling problems (unreadable or partially malformed
    /// netstat output) are warnings instead of halting the loop.
    #[serde(default)]
    pub ignore_exception: bool,

    /// Program names whose ports are always forwarded. Non-empty means only
    /// these names are forwarded.
    #[serde(default)]
    pub allow_program_name: Vec<String>,

    /// Program names whose ports are never forwarded (unless also allowed).
    #[serde(default)]
    pub disallow_program_name: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_interval: default_interval(),
            windows_ip: default_windows_ip(),
            wsl_ip: String::new(),
            ignore_exception: false,
            allow_program_name: Vec::new(),
            disallow_program_name: Vec::new(),
        }
    }
}

impl Config {
    /// Layer CLI flags over the file values.
    ///
    /// Scalars given on the command line replace the file value; the
    /// repeatable name lists are appended.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(interval) = cli.interval {
            self.update_interval = interval;
        }
        if let Some(ref windows_ip) = cli.windows_ip {
            self.windows_ip = windows_ip.clone();
        }
        if let Some(ref wsl_ip) = cli.wsl_ip {
            self.wsl_ip = wsl_ip.clone();
        }
        if cli.ignore_exception {
            self.ignore_exception = true;
        }
        self.allow_program_name.extend(cli.allow.iter().cloned());
        self.disallow_program_name
            .extend(cli.disallow.iter().cloned());
    }

    /// Fill in an auto-detected WSL address when the configured one is empty.
    ///
    /// An explicitly configured address always wins; `None` (detection
    /// failed) leaves the field empty for the caller to decide on.
    #[must_use]
    pub fn with_detected_wsl_ip(mut self, detected: Option<String>) -> Self {
        if self.wsl_ip.is_empty() {
            if let Some(ip) = detected {
                self.wsl_ip = ip;
            }
        }
        self
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.update_interval.is_finite() || self.update_interval <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "update_interval".to_string(),
                message: format!("must be a positive number of seconds, got {}", self.update_interval),
            });
        }
        if self.windows_ip.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "windows_ip".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
