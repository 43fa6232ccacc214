//! `netsh.exe`-backed rule installer.
//!
//! WSL2 can invoke Windows executables directly, so the forwarding and
//! firewall state is managed by shelling out to `netsh.exe`:
//!
//! - `netsh interface portproxy add|delete v4tov4` for the forward itself
//! - `netsh advfirewall firewall add|del rule` to admit inbound traffic
//!
//! All firewall rules share one display name ([`FIREWALL_RULE_NAME`]) so that
//! [`NetshRules::reset_all`] can delete every rule this tool ever created in
//! a single command, including leftovers from a crashed previous run.
//!
//! Each operation is an ordered plan of netsh invocations. Commands marked
//! best-effort tolerate a failing exit status: netsh reports failure when
//! asked to delete something that does not exist, and both the remove and
//! reset paths must treat "already gone" as success to stay idempotent.

use std::process::{Command, ExitStatus};

use tracing::{debug, warn};

use super::error::{InstallError, RemoveError};
use super::RuleInstaller;

/// Display name shared by every firewall rule this tool creates.
pub const FIREWALL_RULE_NAME: &str = "WSL Auto Forward";

/// One planned netsh invocation.
struct NetshCommand {
    /// Short command description for logs and error messages.
    label: &'static str,
    /// Arguments passed to `netsh.exe`.
    args: Vec<String>,
    /// Tolerate a failing exit status (treat as already done).
    best_effort: bool,
}

/// Low-level outcome of one netsh invocation.
enum ExecError {
    /// netsh could not be spawned at all.
    Spawn(std::io::Error),
    /// netsh ran but exited unsuccessfully.
    Status(ExitStatus),
}

/// Manages `netsh` portproxy and firewall state for forwarded ports.
#[derive(Debug, Clone)]
pub struct NetshRules {
    /// Address the host listens on (`listenaddress`).
    windows_ip: String,
    /// WSL address connections are relayed to (`connectaddress`).
    wsl_ip: String,
}

impl NetshRules {
    /// Create an installer forwarding `windows_ip:port` to `wsl_ip:port`.
    #[must_use]
    pub fn new(windows_ip: impl Into<String>, wsl_ip: impl Into<String>) -> Self {
        Self {
            windows_ip: windows_ip.into(),
            wsl_ip: wsl_ip.into(),
        }
    }

    /// Remove every portproxy entry and every firewall rule with our display
    /// name, unconditionally.
    ///
    /// This bypasses the engine entirely; it is the `--clean-rules` action
    /// for recovering from a previous run that did not shut down cleanly.
    pub fn reset_all(&self) -> Result<(), RemoveError> {
        for command in reset_plan() {
            execute(&command).map_err(|err| remove_error(0, command.label, err))?;
        }
        Ok(())
    }

    /// The netsh invocations that install the forward for `port`, in order.
    ///
    /// An identically named firewall rule for the port may already exist,
    /// for example after an unclean shutdown of a previous run. It is
    /// deleted first so that re-installing never stacks duplicate rules;
    /// the portproxy entry needs no such step because `add` overwrites an
    /// existing entry for the same listenaddress:listenport.
    fn install_plan(&self, port: u16) -> Vec<NetshCommand> {
        vec![
            NetshCommand {
                label: "netsh interface portproxy add",
                args: vec![
                    "interface".into(),
                    "portproxy".into(),
                    "add".into(),
                    "v4tov4".into(),
                    format!("listenaddress={}", self.windows_ip),
                    format!("listenport={port}"),
                    format!("connectaddress={}", self.wsl_ip),
                    "protocol=tcp".into(),
                ],
                best_effort: false,
            },
            NetshCommand {
                label: "netsh advfirewall del rule",
                args: firewall_del_args(port),
                best_effort: true,
            },
            NetshCommand {
                label: "netsh advfirewall add rule",
                args: vec![
                    "advfirewall".into(),
                    "firewall".into(),
                    "add".into(),
                    "rule".into(),
                    format!("name={FIREWALL_RULE_NAME}"),
                    "dir=in".into(),
                    "action=allow".into(),
                    "protocol=TCP".into(),
                    format!("localport={port}"),
                ],
                best_effort: false,
            },
        ]
    }

    /// The netsh invocations that remove the forward for `port`, in order.
    ///
    /// Every step is best-effort: removal of a non-installed port must not
    /// error.
    fn remove_plan(&self, port: u16) -> Vec<NetshCommand> {
        vec![
            NetshCommand {
                label: "netsh interface portproxy delete",
                args: vec![
                    "interface".into(),
                    "portproxy".into(),
                    "delete".into(),
                    "v4tov4".into(),
                    "protocol=tcp".into(),
                    format!("listenaddress={}", self.windows_ip),
                    format!("listenport={port}"),
                ],
                best_effort: true,
            },
            NetshCommand {
                label: "netsh advfirewall del rule",
                args: firewall_del_args(port),
                best_effort: true,
            },
        ]
    }
}

impl RuleInstaller for NetshRules {
    fn install(&self, port: u16) -> Result<(), InstallError> {
        for command in self.install_plan(port) {
            execute(&command).map_err(|err| match err {
                ExecError::Spawn(source) => InstallError::CommandFailed {
                    port,
                    command: command.label.to_string(),
                    source,
                },
                ExecError::Status(status) => InstallError::CommandStatus {
                    port,
                    command: command.label.to_string(),
                    status,
                },
            })?;
        }
        debug!(
            "Installed forward {}:{port} -> {}:{port}",
            self.windows_ip, self.wsl_ip
        );
        Ok(())
    }

    fn remove(&self, port: u16) -> Result<(), RemoveError> {
        for command in self.remove_plan(port) {
            execute(&command).map_err(|err| remove_error(port, command.label, err))?;
        }
        debug!("Removed forward for port {port}");
        Ok(())
    }
}

/// Firewall-rule deletion arguments for one port.
fn firewall_del_args(port: u16) -> Vec<String> {
    vec![
        "advfirewall".into(),
        "firewall".into(),
        "del".into(),
        "rule".into(),
        format!("name={FIREWALL_RULE_NAME}"),
        "dir=in".into(),
        "protocol=TCP".into(),
        format!("localport={port}"),
    ]
}

/// The netsh invocations behind [`NetshRules::reset_all`], in order.
fn reset_plan() -> Vec<NetshCommand> {
    vec![
        NetshCommand {
            label: "netsh interface portproxy reset",
            args: vec![
                "interface".into(),
                "portproxy".into(),
                "reset".into(),
                "ipv4".into(),
            ],
            best_effort: false,
        },
        // del reports failure when no rule matches; that just means there
        // is nothing left to clean.
        NetshCommand {
            label: "netsh advfirewall del rule",
            args: vec![
                "advfirewall".into(),
                "firewall".into(),
                "del".into(),
                "rule".into(),
                format!("name={FIREWALL_RULE_NAME}"),
            ],
            best_effort: true,
        },
    ]
}

/// Run one planned invocation, applying its failure tolerance.
fn execute(command: &NetshCommand) -> Result<(), ExecError> {
    let output = Command::new("netsh.exe")
        .args(&command.args)
        .output()
        .map_err(ExecError::Spawn)?;

    if !output.status.success() {
        if command.best_effort {
            warn!(
                "{} exited with {}; treating as already done",
                command.label, output.status
            );
            return Ok(());
        }
        return Err(ExecError::Status(output.status));
    }
    Ok(())
}

/// Map a low-level execution failure onto [`RemoveError`].
fn remove_error(port: u16, label: &str, err: ExecError) -> RemoveError {
    let source = match err {
        ExecError::Spawn(source) => source,
        ExecError::Status(status) => std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("exited with {status}"),
        ),
    };
    RemoveError::CommandFailed {
        port,
        command: label.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> NetshRules {
        NetshRules::new("0.0.0.0", "172.20.0.2")
    }

    #[test]
    fn test_install_plan_deletes_stale_firewall_rule_before_adding() {
        let plan = rules().install_plan(8080);
        assert_eq!(plan.len(), 3);

        let del_pos = plan
            .iter()
            .position(|c| c.args.contains(&"del".to_string()))
            .unwrap();
        let add_pos = plan
            .iter()
            .position(|c| c.args.contains(&"rule".to_string()) && c.args.contains(&"add".to_string()))
            .unwrap();
        assert!(del_pos < add_pos, "stale-rule delete must precede the add");

        // Re-running install must not stack duplicates: the delete is
        // tolerant (the rule may not exist yet) and the add is strict.
        assert!(plan[del_pos].best_effort);
        assert!(!plan[add_pos].best_effort);
        assert!(plan[del_pos].args.contains(&"localport=8080".to_string()));
    }

    #[test]
    fn test_install_plan_portproxy_uses_configured_addresses() {
        let plan = rules().install_plan(3000);
        let portproxy = &plan[0];
        assert!(portproxy.args.contains(&"listenaddress=0.0.0.0".to_string()));
        assert!(portproxy.args.contains(&"listenport=3000".to_string()));
        assert!(portproxy.args.contains(&"connectaddress=172.20.0.2".to_string()));
        assert!(!portproxy.best_effort);
    }

    #[test]
    fn test_remove_plan_is_entirely_best_effort() {
        let plan = rules().remove_plan(443);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|c| c.best_effort));
        assert!(plan
            .iter()
            .all(|c| c.args.iter().any(|a| a.contains("443") || a.contains(FIREWALL_RULE_NAME))));
    }

    #[test]
    fn test_reset_plan_clears_portproxy_and_named_rules() {
        let plan = reset_plan();
        assert!(plan[0].args.contains(&"reset".to_string()));
        assert!(plan[1]
            .args
            .contains(&format!("name={FIREWALL_RULE_NAME}")));
        assert!(plan[1].best_effort);
    }

    #[test]
    fn test_remove_error_from_exit_status_keeps_command_and_port() {
        let err = remove_error(443, "netsh interface portproxy delete", {
            ExecError::Status(ExitStatus::default())
        });
        let rendered = err.to_string();
        assert!(rendered.contains("443"));
        assert!(rendered.contains("netsh interface portproxy delete"));
    }

    #[test]
    fn test_remove_error_from_spawn_failure_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no netsh");
        let err = remove_error(80, "netsh advfirewall del rule", ExecError::Spawn(io));
        assert!(err.to_string().contains("80"));
    }
}
