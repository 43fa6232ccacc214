//! Host-level forwarding rule management.
//!
//! Installing a forward for a port means two things on the Windows side: a
//! `netsh interface portproxy` entry relaying the port to the WSL address,
//! and a firewall rule admitting inbound traffic on it. The engine only sees
//! the [`RuleInstaller`] trait; the shipped implementation is
//! [`NetshRules`], and tests substitute recording fakes.

pub mod error;
pub mod netsh;

pub use error::{InstallError, RemoveError, RuleFailure};
pub use netsh::NetshRules;

/// Installs and removes host-level forwarding rules, one port at a time.
///
/// Both operations are idempotent: installing an already-installed port must
/// not error or double-install, and removing a non-installed port must not
/// error. The engine relies on this when re-converging after partial
/// failures.
pub trait RuleInstaller {
    /// Install the portproxy + firewall rule pair for `port`.
    fn install(&self, port: u16) -> Result<(), InstallError>;

    /// Remove the portproxy + firewall rule pair for `port`.
    fn remove(&self, port: u16) -> Result<(), RemoveError>;
}
