//! netconf-poll - periodic NETCONF operational queries
//!
//! Sends the same `<get>` request to a router a number of times over one
//! SSH session and appends one line per reply to a log file: when it was
//! sent, when the first and last lines arrived, how many bytes came back
//! and the resulting throughput.
//!
//! # Usage
//!
//! ```bash
//! # One query
//! netconf-poll "RSVP InterfaceSummaryTable" -i 192.0.2.10 -u admin
//!
//! # Ten queries, five minutes apart
//! netconf-poll SystemMonitoring -c 10 -s 5 -i 192.0.2.10 -u admin -f monitor.log
//!
//! # Verbose logging
//! RUST_LOG=debug netconf-poll Interfaces -i 192.0.2.10
//! ```
//!
//! # Exit Codes
//!
//! - `0`: every iteration completed
//! - `1`: configuration, session or log failure
//! - `130`: interrupted (`SIGINT` / `SIGTERM`)

mod askpass;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use netconf_poll_core::config::{load_settings_from_path, ConfigOverrides};
use netconf_poll_core::{
    parse_operation, FileSink, Poller, RunOutcome, SshTransport, SystemClock,
};

/// Exit status after an interrupt
const EXIT_CANCELLED: u8 = 130;

/// Periodically query a router over a NETCONF shell
#[derive(Parser, Debug)]
#[command(name = "netconf-poll")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Operation path, e.g. "RSVP InterfaceSummaryTable"
    #[arg(required = true, num_args = 1.., value_name = "OPERATION")]
    operation: Vec<String>,

    /// Number of queries to send [default: 1]
    #[arg(short = 'c', long)]
    count: Option<u32>,

    /// Minutes to wait between queries [default: 1]
    #[arg(short = 's', long, value_name = "MINUTES")]
    sleep: Option<f64>,

    /// Router address
    #[arg(short = 'i', long, value_name = "HOST")]
    ip: Option<String>,

    /// SSH port [default: 22]
    #[arg(long)]
    port: Option<u16>,

    /// Login name
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Login password (prefer the environment variable)
    #[arg(short = 'p', long, env = "NETCONF_POLL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log file receiving one line per query
    #[arg(short = 'f', long, value_name = "FILE")]
    filename: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Milliseconds to drain session banners before the first query
    #[arg(long, value_name = "MS")]
    settle_ms: Option<u64>,

    /// Seconds to wait for a complete reply, 0 waits forever [default: 120]
    #[arg(long, value_name = "SECS")]
    response_timeout_secs: Option<u64>,

    /// Announce the base capability before the first query
    #[arg(long)]
    hello: bool,

    /// Extra ssh option, passed as `-o OPTION` (repeatable)
    #[arg(long = "ssh-option", value_name = "OPTION")]
    ssh_options: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "NETCONF_POLL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.ip.clone(),
            port: self.port,
            username: self.user.clone(),
            password: self.password.clone(),
            count: self.count,
            sleep_minutes: self.sleep,
            log_file: self.filename.clone(),
            settle_ms: self.settle_ms,
            response_timeout_secs: self.response_timeout_secs,
            send_hello: self.hello.then_some(true),
            ssh_options: self.ssh_options.clone(),
        }
    }

    fn path_tokens(&self) -> Vec<String> {
        parse_operation(&self.operation.join(" "))
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "netconf_poll={level},netconf_poll_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel the run on SIGINT or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Failed to listen for SIGINT");
                        return;
                    }
                    info!("Received SIGINT, stopping");
                }
                _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Received Ctrl-C, stopping");
        }

        cancel.cancel();
    });
}

async fn run(args: Args) -> Result<RunOutcome> {
    let mut settings = load_settings_from_path(args.config.clone())?;
    args.overrides().apply(&mut settings);
    if let Some(path) = &settings.config_file {
        info!(config_path = ?path, "Config file");
    }
    info!(source = %settings.host_source, "Host setting");

    let config = settings.into_run_config(args.path_tokens())?;

    let mut transport = SshTransport::new()
        .with_program(config.ssh_program.clone())
        .with_shell_command(config.shell_command.clone());
    for option in &config.ssh_options {
        transport = transport.with_option(option.clone());
    }
    if config.target.password.is_some() {
        let helper = std::env::current_exe().context("Failed to locate own executable")?;
        transport = transport.with_askpass(helper);
    }

    let sink = FileSink::open(&config.log_path).await?;
    info!(log_path = ?sink.path(), "Appending results");

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mut poller = Poller::new(config, transport, SystemClock, sink);
    let report = poller.run(cancel).await?;

    info!(
        iterations = report.iterations_completed,
        outcome = ?report.outcome,
        "Run finished"
    );
    Ok(report.outcome)
}

fn main() -> ExitCode {
    if let Some(code) = askpass::respond() {
        return code;
    }

    let args = Args::parse();
    init_logging(&args.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::Cancelled) => ExitCode::from(EXIT_CANCELLED),
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_short_flags() {
        let args = Args::try_parse_from([
            "netconf-poll",
            "RSVP InterfaceSummaryTable",
            "-c",
            "3",
            "-s",
            "0.5",
            "-i",
            "192.0.2.10",
            "-u",
            "admin",
            "-f",
            "rsvp.log",
        ])
        .unwrap();

        assert_eq!(args.path_tokens(), vec!["RSVP", "InterfaceSummaryTable"]);
        let overrides = args.overrides();
        assert_eq!(overrides.count, Some(3));
        assert_eq!(overrides.sleep_minutes, Some(0.5));
        assert_eq!(overrides.host.as_deref(), Some("192.0.2.10"));
        assert_eq!(overrides.username.as_deref(), Some("admin"));
        assert_eq!(overrides.log_file, Some(PathBuf::from("rsvp.log")));
        assert_eq!(overrides.send_hello, None);
    }

    #[test]
    fn test_operation_may_span_arguments() {
        let args =
            Args::try_parse_from(["netconf-poll", "Interfaces", "InterfaceTable", "--hello"])
                .unwrap();
        assert_eq!(args.path_tokens(), vec!["Interfaces", "InterfaceTable"]);
        assert_eq!(args.overrides().send_hello, Some(true));
    }

    #[test]
    fn test_repeatable_ssh_option() {
        let args = Args::try_parse_from([
            "netconf-poll",
            "A",
            "--ssh-option",
            "StrictHostKeyChecking=no",
            "--ssh-option",
            "ConnectTimeout=5",
        ])
        .unwrap();
        assert_eq!(args.ssh_options.len(), 2);
    }

    #[test]
    fn test_operation_required() {
        assert!(Args::try_parse_from(["netconf-poll"]).is_err());
    }
}
