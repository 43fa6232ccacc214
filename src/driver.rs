//! Scheduler driving the reconciliation engine.
//!
//! The [`Driver`] owns the engine, sampler, policy and status reporter, and
//! runs sample → filter → reconcile cycles either on a fixed interval (auto
//! mode) or once per console line (manual mode). Everything within a cycle is
//! strictly sequential on one task; the only suspension points are the
//! interval tick and the wait for a console line, and the shutdown signal is
//! observed only there. A cycle that has started always runs to completion.
//!
//! Whatever way a run loop exits (shutdown signal, stdin closing, or an
//! error), the driver drains every installed forward before returning, so a
//! normal process exit never leaves orphaned host rules behind.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::console::StatusReporter;
use crate::engine::{ReconcileOutcome, ReconciliationEngine};
use crate::policy::ForwardPolicy;
use crate::rules::RuleInstaller;
use crate::sampler::{PortSampler, SampleError};

/// Errors that stop a driver run loop.
///
/// Per-port rule failures and (when tolerated) malformed sample lines never
/// surface here; they are logged and the next cycle retries. These errors
/// still go through the drain path before the driver returns.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Sampling failed and the configuration says not to ignore it.
    #[error(transparent)]
    Sample(#[from] SampleError),

    /// A sample contained unparseable entries and the configuration says not
    /// to ignore them.
    #[error("{count} netstat line(s) could not be parsed (run with --ignore-exception to continue anyway)")]
    MalformedSample {
        /// How many lines were skipped.
        count: usize,
    },

    /// Reading the manual-mode trigger from stdin failed.
    #[error("Failed to read from stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

/// Runs reconciliation cycles and guarantees a drain on exit.
pub struct Driver<S, R, T>
where
    S: PortSampler,
    R: RuleInstaller,
    T: StatusReporter,
{
    sampler: S,
    engine: ReconciliationEngine<R>,
    policy: ForwardPolicy,
    reporter: T,
    interval: Duration,
    /// When true, sampling problems are warnings; when false they halt the
    /// run loop (after which the drain still runs).
    ignore_errors: bool,
}

impl<S, R, T> Driver<S, R, T>
where
    S: PortSampler,
    R: RuleInstaller,
    T: StatusReporter,
{
    /// Assemble a driver.
    pub fn new(
        sampler: S,
        engine: ReconciliationEngine<R>,
        policy: ForwardPolicy,
        reporter: T,
        interval: Duration,
        ignore_errors: bool,
    ) -> Self {
        Self {
            sampler,
            engine,
            policy,
            reporter,
            interval,
            ignore_errors,
        }
    }

    /// Run cycles on the configured interval until `shutdown` fires.
    ///
    /// The first cycle reports its status unconditionally; later cycles
    /// re-render only when they changed something. Returns the ports drained
    /// on the way out.
    pub async fn run_auto(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<u16>, DriverError> {
        let hint = format!(
            "Updates only when the network state changes (interval = {}s).",
            self.interval.as_secs_f64()
        );
        let result = self.auto_loop(&mut shutdown, &hint).await;
        let drained = self.engine.drain();
        info!("Removed {} forwarded ports on exit", drained.len());
        result.map(|()| drained)
    }

    async fn auto_loop(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
        hint: &str,
    ) -> Result<(), DriverError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately, so the forced initial cycle
        // happens without waiting a full interval.
        let mut force = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A skipped cycle (tolerated sample failure) must not
                    // consume the force flag: the first cycle that actually
                    // completes still has to render a status screen.
                    if self.cycle(force, hint)?.is_some() {
                        force = false;
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Shutdown signal received, leaving auto loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run one forced cycle per line read from `input` until `shutdown`
    /// fires or the input closes. Returns the ports drained on the way out.
    ///
    /// `input` is the trigger source; in production it is a buffered stdin,
    /// tests drive it with an in-memory reader.
    pub async fn run_manual<I>(
        mut self,
        input: I,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<u16>, DriverError>
    where
        I: AsyncBufRead + Unpin,
    {
        let result = self.manual_loop(input, &mut shutdown).await;
        let drained = self.engine.drain();
        info!("Removed {} forwarded ports on exit", drained.len());
        result.map(|()| drained)
    }

    async fn manual_loop<I>(
        &mut self,
        input: I,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), DriverError>
    where
        I: AsyncBufRead + Unpin,
    {
        const HINT: &str = "Press Enter to update.";
        let mut lines = input.lines();

        self.cycle(true, HINT)?;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(_) => {
                            self.cycle(true, HINT)?;
                        }
                        None => {
                            debug!("Trigger input closed, leaving manual loop");
                            return Ok(());
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Shutdown signal received, leaving manual loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run one sample → filter → reconcile → report cycle.
    ///
    /// Returns `None` when sampling failed but the configuration tolerates
    /// it; the previous installed state is kept untouched in that case rather
    /// than treating an unreadable sample as "no ports are listening".
    fn cycle(&mut self, force: bool, hint: &str) -> Result<Option<ReconcileOutcome>, DriverError> {
        let sample = match self.sampler.sample() {
            Ok(sample) => sample,
            Err(err) if self.ignore_errors => {
                warn!("Skipping cycle, sampling failed: {err}");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        for issue in &sample.issues {
            warn!("Skipped unparseable netstat line {:?}: {}", issue.line, issue.reason);
        }
        if !sample.issues.is_empty() && !self.ignore_errors {
            return Err(DriverError::MalformedSample {
                count: sample.issues.len(),
            });
        }

        let desired: BTreeMap<_, _> = sample
            .listeners
            .into_iter()
            .filter(|(_, listener)| self.policy.is_eligible(&listener.program))
            .collect();

        let outcome = self.engine.reconcile(desired);
        if outcome.changes() > 0 || force {
            self.reporter.report(
                self.engine.installed(),
                self.engine.update_count(),
                Local::now(),
                hint,
            );
        }
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::StatusReporter;
    use crate::rules::error::{InstallError, RemoveError};
    use crate::sampler::{Listener, ParseIssue, Sample, SampleResult};
    use chrono::{DateTime, Local};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FixedSampler {
        sample: Sample,
    }

    impl FixedSampler {
        fn with_ports(entries: &[(u16, u32, &str)]) -> Self {
            let listeners = entries
                .iter()
                .map(|&(port, pid, program)| {
                    (
                        port,
                        Listener {
                            port,
                            pid,
                            program: program.to_string(),
                        },
                    )
                })
                .collect();
            Self {
                sample: Sample {
                    listeners,
                    issues: Vec::new(),
                },
            }
        }
    }

    impl PortSampler for FixedSampler {
        fn sample(&self) -> SampleResult<Sample> {
            Ok(self.sample.clone())
        }
    }

    #[derive(Default)]
    struct NullRules;

    impl RuleInstaller for NullRules {
        fn install(&self, _port: u16) -> Result<(), InstallError> {
            Ok(())
        }
        fn remove(&self, _port: u16) -> Result<(), RemoveError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingReporter {
        reports: Rc<RefCell<Vec<usize>>>,
    }

    impl StatusReporter for RecordingReporter {
        fn report(
            &mut self,
            installed: &BTreeMap<u16, Listener>,
            _update_count: u64,
            _now: DateTime<Local>,
            _hint: &str,
        ) {
            self.reports.borrow_mut().push(installed.len());
        }
    }

    fn driver_with(
        sampler: FixedSampler,
        policy: ForwardPolicy,
        ignore_errors: bool,
    ) -> (
        Driver<FixedSampler, NullRules, RecordingReporter>,
        Rc<RefCell<Vec<usize>>>,
    ) {
        let reporter = RecordingReporter::default();
        let reports = Rc::clone(&reporter.reports);
        let driver = Driver::new(
            sampler,
            ReconciliationEngine::new(NullRules),
            policy,
            reporter,
            Duration::from_millis(500),
            ignore_errors,
        );
        (driver, reports)
    }

    #[test]
    fn test_first_cycle_reports_even_without_changes() {
        let (mut driver, reports) =
            driver_with(FixedSampler::with_ports(&[]), ForwardPolicy::default(), false);

        driver.cycle(true, "").unwrap();
        assert_eq!(reports.borrow().len(), 1);

        // Second cycle: still no changes, not forced, so no report.
        driver.cycle(false, "").unwrap();
        assert_eq!(reports.borrow().len(), 1);
    }

    #[test]
    fn test_changes_trigger_report_without_force() {
        let (mut driver, reports) = driver_with(
            FixedSampler::with_ports(&[(8080, 1, "node")]),
            ForwardPolicy::default(),
            false,
        );

        driver.cycle(false, "").unwrap();
        assert_eq!(reports.borrow().as_slice(), &[1]);
    }

    #[test]
    fn test_policy_filters_before_reconcile() {
        let (mut driver, _) = driver_with(
            FixedSampler::with_ports(&[(22, 1, "sshd"), (80, 2, "nginx")]),
            ForwardPolicy::new(Vec::new(), vec!["sshd".to_string()]),
            false,
        );

        let outcome = driver.cycle(true, "").unwrap().unwrap();
        assert!(outcome.added.contains(&80));
        assert!(!outcome.added.contains(&22));
    }

    #[test]
    fn test_parse_issues_halt_when_not_ignored() {
        let sampler = FixedSampler {
            sample: Sample {
                listeners: BTreeMap::new(),
                issues: vec![ParseIssue {
                    line: "garbage".to_string(),
                    reason: "bad".to_string(),
                }],
            },
        };
        let (mut driver, _) = driver_with(sampler, ForwardPolicy::default(), false);

        let err = driver.cycle(true, "").unwrap_err();
        assert!(matches!(err, DriverError::MalformedSample { count: 1 }));
    }

    #[test]
    fn test_parse_issues_tolerated_when_ignored() {
        let sampler = FixedSampler {
            sample: Sample {
                listeners: BTreeMap::new(),
                issues: vec![ParseIssue {
                    line: "garbage".to_string(),
                    reason: "bad".to_string(),
                }],
            },
        };
        let (mut driver, reports) = driver_with(sampler, ForwardPolicy::default(), true);

        let outcome = driver.cycle(true, "").unwrap();
        assert!(outcome.is_some());
        assert_eq!(reports.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_mode_forces_report_per_line_and_drains_on_eof() {
        let (driver, reports) = driver_with(
            FixedSampler::with_ports(&[(8080, 1, "node")]),
            ForwardPolicy::default(),
            false,
        );
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // Two "Enter" presses, then the input closes.
        let input = tokio::io::BufReader::new(&b"\n\n"[..]);
        let drained = driver.run_manual(input, shutdown_rx).await.unwrap();

        // Initial forced report plus one forced report per line, even though
        // only the first cycle changed anything.
        assert_eq!(reports.borrow().len(), 3);
        // Input EOF still drains the installed forward.
        assert_eq!(drained, vec![8080]);
    }

    #[tokio::test]
    async fn test_manual_mode_observes_shutdown_signal() {
        let (driver, reports) = driver_with(
            FixedSampler::with_ports(&[]),
            ForwardPolicy::default(),
            false,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        // A reader that stays open but never yields a line: the loop must
        // leave via the shutdown branch, not hang on input.
        let (reader, _writer) = tokio::io::duplex(64);
        let input = tokio::io::BufReader::new(reader);
        let drained = driver.run_manual(input, shutdown_rx).await.unwrap();
        assert!(drained.is_empty());
        assert_eq!(reports.borrow().len(), 1);
    }

    struct FailingSampler;

    impl PortSampler for FailingSampler {
        fn sample(&self) -> SampleResult<Sample> {
            Err(SampleError::CommandFailed {
                command: "netstat -tpln".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no netstat"),
            })
        }
    }

    #[test]
    fn test_sample_failure_skips_cycle_when_ignored() {
        let mut driver = Driver::new(
            FailingSampler,
            ReconciliationEngine::new(NullRules),
            ForwardPolicy::default(),
            RecordingReporter::default(),
            Duration::from_millis(500),
            true,
        );
        let outcome = driver.cycle(true, "").unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_sample_failure_halts_when_not_ignored() {
        let mut driver = Driver::new(
            FailingSampler,
            ReconciliationEngine::new(NullRules),
            ForwardPolicy::default(),
            RecordingReporter::default(),
            Duration::from_millis(500),
            false,
        );
        assert!(matches!(
            driver.cycle(true, ""),
            Err(DriverError::Sample(_))
        ));
    }
}
