//! Command-line interface definitions.
//!
//! Uses clap's derive API. Flag defaults are deliberately absent here: every
//! option is `Option`/repeatable so that [`Config::apply_cli`]
//! (crate::config::Config::apply_cli) can tell "not given" apart from "given
//! with the default value" when layering flags over the config file.

use clap::{Parser, ValueEnum};

/// When reconciliation cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Poll on a fixed interval and update when the network state changes.
    Auto,
    /// Update once per line entered on the console.
    Manual,
}

/// Forward WSL2 TCP listening ports to the Windows host.
///
/// Keeps `netsh` portproxy and firewall rules converged to the set of ports
/// currently listening inside the WSL distribution, so programs outside the
/// machine can reach them. Requires Windows administrator privileges.
#[derive(Parser, Debug)]
#[command(name = "wsl-port-forward")]
#[command(author, version, about)]
pub struct Cli {
    /// When to update port forwarding rules.
    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Seconds between updates (auto mode only).
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// Program name whose ports are forwarded (repeatable).
    ///
    /// Giving this at least once restricts forwarding to the named programs.
    #[arg(long, value_name = "NAME")]
    pub allow: Vec<String>,

    /// Program name whose ports are never forwarded (repeatable).
    #[arg(long, value_name = "NAME")]
    pub disallow: Vec<String>,

    /// Windows address external clients connect to.
    #[arg(long, value_name = "ADDR")]
    pub windows_ip: Option<String>,

    /// WSL address connections are relayed to (default: auto-detect).
    #[arg(long, value_name = "ADDR")]
    pub wsl_ip: Option<String>,

    /// Keep running when netstat output cannot be (fully) parsed.
    #[arg(long)]
    pub ignore_exception: bool,

    /// Write the effective configuration to ~/.wsl-port-forward.json and exit.
    #[arg(long)]
    pub gen_config: bool,

    /// Remove all portproxy and firewall rules this tool manages, then exit.
    #[arg(long)]
    pub clean_rules: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["wsl-port-forward"]);
        assert_eq!(cli.mode, Mode::Auto);
        assert!(cli.interval.is_none());
        assert!(cli.allow.is_empty());
        assert!(cli.disallow.is_empty());
        assert!(cli.windows_ip.is_none());
        assert!(cli.wsl_ip.is_none());
        assert!(!cli.ignore_exception);
        assert!(!cli.gen_config);
        assert!(!cli.clean_rules);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_manual_mode() {
        let cli = Cli::parse_from(["wsl-port-forward", "--mode", "manual"]);
        assert_eq!(cli.mode, Mode::Manual);
    }

    #[test]
    fn test_repeatable_name_filters() {
        let cli = Cli::parse_from([
            "wsl-port-forward",
            "--allow",
            "nginx",
            "--allow",
            "node",
            "--disallow",
            "sshd",
        ]);
        assert_eq!(cli.allow, vec!["nginx", "node"]);
        assert_eq!(cli.disallow, vec!["sshd"]);
    }

    #[test]
    fn test_parse_addresses_and_interval() {
        let cli = Cli::parse_from([
            "wsl-port-forward",
            "--interval",
            "1.5",
            "--windows-ip",
            "10.0.0.5",
            "--wsl-ip",
            "172.20.0.2",
        ]);
        assert_eq!(cli.interval, Some(1.5));
        assert_eq!(cli.windows_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(cli.wsl_ip.as_deref(), Some("172.20.0.2"));
    }

    #[test]
    fn test_parse_actions_and_verbosity() {
        let cli = Cli::parse_from(["wsl-port-forward", "--gen-config", "-vv"]);
        assert!(cli.gen_config);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["wsl-port-forward", "--clean-rules"]);
        assert!(cli.clean_rules);
    }
}
