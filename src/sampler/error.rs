//! Error types for port sampling.

use thiserror::Error;

/// Errors from enumerating listening ports.
///
/// These cover a wholly unusable sample (the enumeration command could not
/// run or produced no readable output). Individually malformed lines are not
/// errors; they are collected as [`ParseIssue`](super::ParseIssue)s on the
/// sample instead, so one bad line never discards the rest of the snapshot.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The enumeration command could not be spawned.
    #[error("Failed to run {command}: {source}")]
    CommandFailed {
        /// The command we tried to run.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The enumeration command ran but exited unsuccessfully.
    #[error("{command} exited with {status}")]
    CommandStatus {
        /// The command that failed.
        command: String,
        /// Its exit status.
        status: std::process::ExitStatus,
    },

    /// The command output was not valid UTF-8.
    #[error("Command output is not valid UTF-8: {0}")]
    InvalidOutput(#[from] std::string::FromUtf8Error),
}

/// Result type for sampling operations.
pub type SampleResult<T> = Result<T, SampleError>;
