//! wsl-port-forward binary entry point.
//!
//! Handles CLI parsing, logging initialization, configuration loading, the
//! administrator privilege gate, and the one-shot actions (`--gen-config`,
//! `--clean-rules`) before handing control to the forwarding driver.
//!
//! Exit codes: 0 on every clean path (including `--gen-config` and
//! `--clean-rules`), -1 when administrator privileges are missing, and the
//! usual non-zero failure exit for any other error.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info};

use wsl_port_forward::{
    cli::{Cli, Mode},
    config::{detect_wsl_ip, Config, ConfigLoader},
    console::ConsoleReporter,
    driver::Driver,
    engine::ReconciliationEngine,
    policy::ForwardPolicy,
    privilege,
    rules::NetshRules,
    sampler::NetstatSampler,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    let loader = ConfigLoader::new().context("Failed to locate configuration file")?;
    let mut config = loader.load().context("Failed to load configuration")?;
    config.apply_cli(&cli);
    config.validate().context("Invalid configuration")?;

    // Detect the WSL address before --gen-config so the generated file
    // carries it; a failed detection leaves the field empty, which keeps the
    // documented "empty means auto-detect" semantics.
    if config.wsl_ip.is_empty() {
        config = config.with_detected_wsl_ip(detect_wsl_ip());
        if !config.wsl_ip.is_empty() {
            debug!("Auto-detected WSL address {}", config.wsl_ip);
        }
    }

    if cli.gen_config {
        loader.save(&config).context("Failed to write configuration")?;
        println!("Successfully saved config to {}.", loader.path().display());
        return Ok(());
    }

    if !privilege::has_admin_privilege() {
        eprintln!("Windows administrator privileges are required to manage netsh rules.");
        eprintln!("Start WSL from an elevated terminal and try again.");
        std::process::exit(-1);
    }

    if config.wsl_ip.is_empty() {
        anyhow::bail!("Could not auto-detect the WSL address; pass --wsl-ip explicitly");
    }

    let rules = NetshRules::new(&config.windows_ip, &config.wsl_ip);

    if cli.clean_rules {
        rules
            .reset_all()
            .context("Failed to clean netsh rules")?;
        println!("Successfully cleaned all portproxy rules and relevant firewall rules.");
        return Ok(());
    }

    run(cli.mode, &config, rules)
}

/// Run the forwarding loop on a single-threaded runtime.
///
/// Sampling, reconciling and rule installation all happen sequentially on
/// the runtime's one thread; Ctrl+C flips a watch channel that the driver
/// observes at its suspension points, after which it drains every installed
/// rule before returning.
fn run(mode: Mode, config: &Config, rules: NetshRules) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                let _ = shutdown_tx.send(true);
            }
        });

        let policy = ForwardPolicy::new(
            config.allow_program_name.iter().cloned(),
            config.disallow_program_name.iter().cloned(),
        );
        let driver = Driver::new(
            NetstatSampler::new(),
            ReconciliationEngine::new(rules),
            policy,
            ConsoleReporter::new(),
            Duration::from_secs_f64(config.update_interval),
            config.ignore_exception,
        );

        let drained = match mode {
            Mode::Auto => driver.run_auto(shutdown_rx).await,
            Mode::Manual => {
                let input = tokio::io::BufReader::new(tokio::io::stdin());
                driver.run_manual(input, shutdown_rx).await
            }
        }
        .context("Forwarding loop failed")?;

        println!();
        println!(
            "Exited, removed {} port forwarding and firewall rule(s).",
            drained.len()
        );
        Ok(())
    })
}

/// Initialize the tracing subscriber.
///
/// # Verbosity levels
/// - 0 (default): warnings and errors
/// - 1 (-v): info
/// - 2 (-vv): debug
/// - 3+ (-vvv): trace
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
