//! Error types for forwarding-rule operations.

use thiserror::Error;

/// Failure to install a forwarding rule for a port.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The rule command could not be spawned.
    #[error("Failed to run {command} for port {port}: {source}")]
    CommandFailed {
        /// Port being installed.
        port: u16,
        /// The command we tried to run.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The rule command ran but reported failure.
    #[error("{command} for port {port} exited with {status}")]
    CommandStatus {
        /// Port being installed.
        port: u16,
        /// The command that failed.
        command: String,
        /// Its exit status.
        status: std::process::ExitStatus,
    },
}

/// Failure to remove a forwarding rule for a port.
#[derive(Debug, Error)]
pub enum RemoveError {
    /// The rule command could not be spawned.
    #[error("Failed to run {command} for port {port}: {source}")]
    CommandFailed {
        /// Port being removed.
        port: u16,
        /// The command we tried to run.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A per-port failure recorded during one reconcile batch.
///
/// Failures never abort the batch; they are collected and surfaced by the
/// driver, and the next cycle naturally retries whatever is still missing.
#[derive(Debug, Error)]
pub enum RuleFailure {
    /// Installing the forward for a port failed.
    #[error("install failed: {0}")]
    Install(#[from] InstallError),

    /// Removing the forward for a port failed.
    #[error("remove failed: {0}")]
    Remove(#[from] RemoveError),
}

impl RuleFailure {
    /// The port the failed operation targeted.
    #[must_use]
    pub fn port(&self) -> u16 {
        match self {
            RuleFailure::Install(InstallError::CommandFailed { port, .. })
            | RuleFailure::Install(InstallError::CommandStatus { port, .. })
            | RuleFailure::Remove(RemoveError::CommandFailed { port, .. }) => *port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_error_mentions_port() {
        let err = InstallError::CommandStatus {
            port: 8080,
            command: "netsh portproxy add".to_string(),
            status: std::process::ExitStatus::default(),
        };
        assert!(err.to_string().contains("8080"));
    }

    #[test]
    fn test_rule_failure_exposes_port() {
        let failure = RuleFailure::Remove(RemoveError::CommandFailed {
            port: 443,
            command: "netsh portproxy delete".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        });
        assert_eq!(failure.port(), 443);
    }
}
