//! Windows administrator privilege check.
//!
//! `netsh interface portproxy` and `netsh advfirewall` both require an
//! elevated session, so the daemon refuses to start without one instead of
//! failing on the first rule command.

use std::process::{Command, Stdio};

use tracing::debug;

/// Whether the current session has Windows administrator privileges.
///
/// Probes by running `net.exe session`, which fails with "access denied"
/// in a non-elevated session. Any inability to run the probe at all (for
/// example outside WSL interop) also counts as not elevated.
#[must_use]
pub fn has_admin_privilege() -> bool {
    let status = Command::new("net.exe")
        .arg("session")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("Could not run net.exe session: {e}");
            false
        }
    }
}
