//! Console status rendering.
//!
//! Presentation only: the driver hands the current installed map, cumulative
//! update count and a timestamp to a [`StatusReporter`], and nothing it
//! returns feeds back into reconciliation. The shipped implementation redraws
//! a boxed summary table on the terminal; tests substitute a recorder.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::sampler::Listener;

/// Sink for per-cycle status snapshots.
pub trait StatusReporter {
    /// Render one status snapshot.
    ///
    /// `hint` is a trailing mode-specific line ("press enter to update" and
    /// the like).
    fn report(
        &mut self,
        installed: &BTreeMap<u16, Listener>,
        update_count: u64,
        now: DateTime<Local>,
        hint: &str,
    );
}

/// Redraws the status table on stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Create a console reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StatusReporter for ConsoleReporter {
    fn report(
        &mut self,
        installed: &BTreeMap<u16, Listener>,
        update_count: u64,
        now: DateTime<Local>,
        hint: &str,
    ) {
        // Clear the screen and home the cursor before redrawing.
        print!("\x1b[2J\x1b[H");
        print!("{}", render_status(installed, update_count, now));
        println!("Press Control + C to exit.");
        if !hint.is_empty() {
            println!("{hint}");
        }
    }
}

/// Render the status table to a string.
pub fn render_status(
    installed: &BTreeMap<u16, Listener>,
    update_count: u64,
    now: DateTime<Local>,
) -> String {
    let mut out = String::new();
    let time = now.format("%H:%M:%S");
    let count = format!("{:<5}", installed.len());
    let updates = format!("{:<6}", update_count);

    out.push_str("+-----------------------------------------------------------------------------+\n");
    out.push_str(&format!(
        "| wsl-port-forward {:<58} |\n",
        env!("CARGO_PKG_VERSION")
    ));
    out.push_str("|                                                                             |\n");
    out.push_str(&format!(
        "|  Last update: {time}     Forwarding ports: {count}     Update count: {updates} |\n"
    ));
    out.push_str("|                                                                             |\n");
    out.push_str("+-----------------------------------------------------------------------------+\n");
    out.push_str("| Forwarding ports:                                                           |\n");
    out.push_str("|  PID                 Program name                            Port           |\n");
    out.push_str("|=============================================================================|\n");

    if installed.is_empty() {
        out.push_str("|  No forwarding ports found.                                                 |\n");
    } else {
        for listener in installed.values() {
            out.push_str(&format!(
                "|  {:<6}              {:<36}    {:<5}          |\n",
                listener.pid, listener.program, listener.port
            ));
        }
    }
    out.push_str("+-----------------------------------------------------------------------------+\n");
    out
}
