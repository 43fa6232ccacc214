//! Listening-port enumeration.
//!
//! The engine treats "what TCP ports are listening inside WSL right now" as
//! an opaque operation behind the [`PortSampler`] trait. The shipped
//! implementation ([`NetstatSampler`]) shells out to `netstat -tpln`; tests
//! substitute fixed snapshots.
//!
//! Sampling is tolerant: a line that cannot be parsed is skipped and recorded
//! as a [`ParseIssue`] on the returned [`Sample`], never aborting the whole
//! snapshot. Only a sample source that cannot be read at all is a
//! [`SampleError`].

pub mod error;
pub mod netstat;

pub use error::{SampleError, SampleResult};
pub use netstat::NetstatSampler;

use std::collections::BTreeMap;

/// A TCP socket listening inside WSL, as seen by one sample.
///
/// Produced fresh on every sample and immutable afterwards. Note that the
/// engine diffs by port number only, so `pid` and `program` reflect the
/// sample in which the port was first seen (see
/// [`engine`](crate::engine) for why they are not refreshed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    /// The listening TCP port (1–65535).
    pub port: u16,
    /// Pid of the owning process.
    pub pid: u32,
    /// Program name of the owning process, as reported by netstat.
    pub program: String,
}

/// One line of sample input that could not be parsed.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    /// The raw line, trimmed.
    pub line: String,
    /// Why it was rejected.
    pub reason: String,
}

/// The result of one sampling pass.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Listening ports keyed by port number.
    pub listeners: BTreeMap<u16, Listener>,
    /// Lines that were skipped because they could not be parsed.
    pub issues: Vec<ParseIssue>,
}

/// Source of "current listening ports" snapshots.
pub trait PortSampler {
    /// Take one snapshot of the currently listening TCP ports.
    fn sample(&self) -> SampleResult<Sample>;
}
