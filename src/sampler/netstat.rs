//! `netstat`-based port sampler.
//!
//! Runs `netstat -tpln` inside the WSL distribution and parses its table of
//! listening TCP sockets. Expected line shape (after the two header lines):
//!
//! ```text
//! tcp        0      0 0.0.0.0:8080    0.0.0.0:*    LISTEN    1234/nginx
//! ```
//!
//! Parsing is per-line tolerant: lines that are not TCP listener rows are
//! filtered silently, while rows that look like listeners but fail to parse
//! are collected as [`ParseIssue`]s so the caller can surface them.

use std::process::Command;

use tracing::debug;

use super::error::{SampleError, SampleResult};
use super::{Listener, ParseIssue, PortSampler, Sample};

/// Column count of a netstat TCP row.
const FIELD_COUNT: usize = 7;

/// Field indices within a netstat TCP row.
const PROTOCOL: usize = 0;
const LOCAL_ADDRESS: usize = 3;
const STATE: usize = 5;
const PID_PROGRAM: usize = 6;

/// Samples listening ports by invoking `netstat -tpln`.
#[derive(Debug, Clone, Default)]
pub struct NetstatSampler;

impl NetstatSampler {
    /// Create a new netstat-backed sampler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PortSampler for NetstatSampler {
    fn sample(&self) -> SampleResult<Sample> {
        let output = Command::new("netstat")
            .arg("-tpln")
            .output()
            .map_err(|source| SampleError::CommandFailed {
                command: "netstat -tpln".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(SampleError::CommandStatus {
                command: "netstat -tpln".to_string(),
                status: output.status,
            });
        }

        let stdout = String::from_utf8(output.stdout)?;
        let sample = parse_netstat(&stdout);
        debug!(
            "Sampled {} listening ports ({} lines skipped)",
            sample.listeners.len(),
            sample.issues.len()
        );
        Ok(sample)
    }
}

/// Parse `netstat -tpln` output into a [`Sample`].
///
/// Lines that are not TCP listener rows (headers, other protocols, sockets
/// without an identifiable owner) are filtered without comment. Rows that
/// should be listeners but have an unparseable port or pid/program column are
/// recorded as issues and skipped.
pub fn parse_netstat(output: &str) -> Sample {
    let mut sample = Sample::default();

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // Header lines and non-IPv4-TCP rows are expected noise.
        if fields.len() != FIELD_COUNT || fields[PROTOCOL] != "tcp" {
            continue;
        }
        if fields[STATE] != "LISTEN" {
            continue;
        }
        // Kernel-owned sockets show "-"; there is no program name to filter
        // on, so they are never forwarded.
        if fields[PID_PROGRAM] == "-" {
            continue;
        }

        match parse_listener(fields[LOCAL_ADDRESS], fields[PID_PROGRAM]) {
            Ok(listener) => {
                sample.listeners.insert(listener.port, listener);
            }
            Err(reason) => sample.issues.push(ParseIssue {
                line: line.trim().to_string(),
                reason,
            }),
        }
    }

    sample
}

/// Parse the local-address and pid/program columns of one listener row.
fn parse_listener(local_address: &str, pid_program: &str) -> Result<Listener, String> {
    let (_, port) = local_address
        .rsplit_once(':')
        .ok_or_else(|| format!("local address has no port: {local_address}"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid port: {port}"))?;
    if port == 0 {
        return Err("port 0 is not forwardable".to_string());
    }

    let (pid, program) = pid_program
        .split_once('/')
        .ok_or_else(|| format!("malformed pid/program column: {pid_program}"))?;
    let pid: u32 = pid.parse().map_err(|_| format!("invalid pid: {pid}"))?;
    if program.is_empty() {
        return Err(format!("empty program name: {pid_program}"));
    }

    Ok(Listener {
        port,
        pid,
        program: program.to_string(),
    })
}
