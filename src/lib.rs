//! wsl-port-forward: mirror WSL2 TCP listening ports onto the Windows host.
//!
//! WSL2 runs behind a NAT, so services listening inside the distribution are
//! unreachable from other machines on the network. This crate keeps the host's
//! `netsh` portproxy and firewall state converged to the set of TCP ports
//! currently listening inside WSL: every cycle it samples listening sockets,
//! filters them through an allow/disallow program-name policy, diffs the
//! eligible set against the rules it previously installed, and applies the
//! difference.
//!
//! # Architecture
//!
//! - **Sampler**: enumerates listening sockets (`netstat -tpln`) with tolerant
//!   per-line parsing
//! - **Policy**: allow/disallow program-name filter deciding which ports are
//!   eligible for forwarding
//! - **Engine**: owns the installed-rule state and computes the add/remove
//!   diff each cycle
//! - **Rules**: installs and removes `netsh` portproxy + firewall rules
//! - **Driver**: runs the engine on a timer (auto mode) or per console line
//!   (manual mode) and drains all installed rules on shutdown
//! - **Config**: JSON configuration at `~/.wsl-port-forward.json`, overridden
//!   by CLI flags

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod console;
pub mod driver;
pub mod engine;
pub mod policy;
pub mod privilege;
pub mod rules;
pub mod sampler;
