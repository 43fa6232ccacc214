//! The reconciliation engine.
//!
//! [`ReconciliationEngine`] owns the only persistent state in the process:
//! the map of ports it has installed forwards for. Each cycle it receives the
//! freshly sampled, policy-filtered set of desired ports, diffs it against
//! that map, and converges host state through a [`RuleInstaller`].
//!
//! # Identity and staleness
//!
//! The diff is by port number only. A port present in both the installed map
//! and the desired set is left untouched even when its owning pid or program
//! name changed between samples, so the recorded `pid`/`program` for a
//! long-lived port reflect the sample that first introduced it. Re-validating
//! owner identity would churn rules every time a service restarts on the same
//! port for no observable benefit; the staleness is deliberate.
//!
//! # Optimistic state tracking
//!
//! The installed map tracks *intended* state, not verified host state: after
//! a cycle it always equals the desired set, even for ports whose individual
//! install or remove command failed. Failures are surfaced in the
//! [`ReconcileOutcome`]; no retry is attempted, each cycle is a fresh
//! convergence superseding the previous one.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::rules::{RuleFailure, RuleInstaller};
use crate::sampler::Listener;

/// What one reconciliation cycle did.
///
/// Transient, consumed by the driver for logging and status reporting.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Ports a forward was installed for this cycle.
    pub added: BTreeSet<u16>,
    /// Ports whose forward was removed this cycle.
    pub removed: BTreeSet<u16>,
    /// Per-port command failures; never abort the batch.
    pub failures: Vec<RuleFailure>,
    /// Number of ports installed after the cycle.
    pub total_installed: usize,
}

impl ReconcileOutcome {
    /// Total number of changes (adds plus removes) this cycle made.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Holds the installed-port map and converges it toward each sampled set.
pub struct ReconciliationEngine<R: RuleInstaller> {
    installer: R,
    installed: BTreeMap<u16, Listener>,
    update_count: u64,
}

impl<R: RuleInstaller> ReconciliationEngine<R> {
    /// Create an engine with no installed ports.
    pub fn new(installer: R) -> Self {
        Self {
            installer,
            installed: BTreeMap::new(),
            update_count: 0,
        }
    }

    /// The ports currently installed, keyed by port number.
    pub fn installed(&self) -> &BTreeMap<u16, Listener> {
        &self.installed
    }

    /// Cumulative number of adds and removes over the engine's lifetime.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Converge host forwarding state to `desired`.
    ///
    /// Installs forwards for ports in `desired` but not yet installed, and
    /// removes forwards for installed ports no longer in `desired`. Each
    /// port's command is independent: a failure is recorded in the outcome
    /// and the remaining ports are still processed. Afterwards the installed
    /// map is replaced with `desired` unconditionally (see the module docs on
    /// optimistic tracking).
    pub fn reconcile(&mut self, desired: BTreeMap<u16, Listener>) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for &port in desired.keys() {
            if self.installed.contains_key(&port) {
                continue;
            }
            debug!("Installing forward for port {port}");
            if let Err(err) = self.installer.install(port) {
                warn!("Install for port {port} failed: {err}");
                outcome.failures.push(err.into());
            }
            outcome.added.insert(port);
        }

        for &port in self.installed.keys() {
            if desired.contains_key(&port) {
                continue;
            }
            debug!("Removing forward for port {port}");
            if let Err(err) = self.installer.remove(port) {
                warn!("Remove for port {port} failed: {err}");
                outcome.failures.push(err.into());
            }
            outcome.removed.insert(port);
        }

        self.installed = desired;
        self.update_count += outcome.changes() as u64;
        outcome.total_installed = self.installed.len();
        outcome
    }

    /// Remove every installed forward and empty the installed map.
    ///
    /// Used at shutdown. Idempotent: a second call finds the map empty and
    /// issues no commands. Returns the ports that were removed.
    pub fn drain(&mut self) -> Vec<u16> {
        let mut drained = Vec::with_capacity(self.installed.len());
        for &port in self.installed.keys() {
            if let Err(err) = self.installer.remove(port) {
                warn!("Remove for port {port} failed during drain: {err}");
            }
            drained.push(port);
        }
        self.update_count += drained.len() as u64;
        self.installed.clear();
        if !drained.is_empty() {
            debug!("Drained {} forwarded ports", drained.len());
        }
        drained
    }
}
