//! wolfies-scheduler-daemon - background sender for scheduled messages.
//!
//! CHANGELOG:
//! - 10/19/2026 - Heartbeat liveness, SIGTERM stop, stale-state cleanup (Claude)
//! - 01/10/2026 - Initial implementation (Phase 4C, Claude)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use wolfies_scheduler::commands::status::{DaemonStatus, StatusReport};
use wolfies_scheduler::config::Config;
use wolfies_scheduler::context::RuntimeContext;
use wolfies_scheduler::daemon::{install_signal_handler, Daemon, LivenessTimings};
use wolfies_scheduler::output::OutputControls;
use wolfies_scheduler::sender::{
    AppleScriptSender, EmailNotifier, LogNotifier, MessageSender, NotificationSink,
};
use wolfies_scheduler::store::{DaemonStateStore, MessageStore};

const STOP_WAIT: Duration = Duration::from_secs(10);
const STOP_POLL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "wolfies-scheduler-daemon")]
#[command(about = "Background daemon that sends scheduled messages")]
struct Cli {
    /// Data directory (default: $WOLFIES_SCHEDULER_DATA_DIR or ~/.wolfies-scheduler)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the daemon
    Stop,

    /// Check daemon status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(ref dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    let result = match cli.command {
        Commands::Start { foreground } => cmd_start(config, foreground),
        Commands::Stop => cmd_stop(&config),
        Commands::Status { json } => cmd_status(&config, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Run `future` to completion on a fresh current-thread runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}

fn cmd_start(config: Config, foreground: bool) -> Result<ExitCode> {
    let state = DaemonStateStore::new(&config.data_dir);
    if block_on(state.is_running())?? {
        println!("Daemon already running");
        return Ok(ExitCode::from(1));
    }

    config.ensure_data_dir()?;

    if foreground {
        wolfies_scheduler::logging::init(&config.log_level, true);
    } else {
        use daemonize::Daemonize;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_file())
            .with_context(|| format!("Failed to open {}", config.log_file().display()))?;
        let log_err = log.try_clone().context("Failed to duplicate log handle")?;

        println!("Starting daemon (logs: {})", config.log_file().display());

        let daemonize = Daemonize::new()
            .pid_file(config.pid_file())
            .working_directory(&config.data_dir)
            .stdout(log)
            .stderr(log_err);

        if let Err(e) = daemonize.start() {
            bail!("Failed to daemonize: {}", e);
        }

        // Child process from here on; stderr is daemon.log
        wolfies_scheduler::logging::init(&config.log_level, false);
    }

    let pid_file = config.pid_file();
    let outcome = block_on(run_daemon(config))?;
    let _ = std::fs::remove_file(pid_file);

    match outcome {
        Ok(_) => Ok(ExitCode::from(0)),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Daemon exited with error");
            Ok(ExitCode::from(1))
        }
    }
}

async fn run_daemon(config: Config) -> Result<wolfies_scheduler::daemon::ExitReason> {
    let sender: Arc<dyn MessageSender> = Arc::new(AppleScriptSender::new());
    let notifier: Arc<dyn NotificationSink> = if config.email.enabled {
        Arc::new(EmailNotifier::new(config.email.clone()))
    } else {
        Arc::new(LogNotifier)
    };

    let ctx = Arc::new(RuntimeContext::new(config, sender, notifier));
    let daemon = Daemon::new(ctx, LivenessTimings::default());
    let stop = install_signal_handler();

    daemon.run(stop).await
}

fn cmd_stop(config: &Config) -> Result<ExitCode> {
    let state_store = DaemonStateStore::new(&config.data_dir);
    let Some(state) = block_on(state_store.load())?? else {
        println!("Daemon not running");
        return Ok(ExitCode::from(0));
    };

    let pid = i32::try_from(state.pid).context("Recorded pid out of range")?;

    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            block_on(state_store.remove())?;
            let _ = std::fs::remove_file(config.pid_file());
            println!("Daemon not running (removed stale state for pid {})", pid);
            return Ok(ExitCode::from(0));
        }
        bail!("Failed to signal pid {}: {}", pid, err);
    }

    let mut waited = Duration::ZERO;
    while waited < STOP_WAIT {
        if !state_store.path().exists() {
            println!("Daemon stopped (pid {})", pid);
            return Ok(ExitCode::from(0));
        }
        std::thread::sleep(STOP_POLL);
        waited += STOP_POLL;
    }

    println!("Sent SIGTERM to pid {}, but the daemon has not exited yet", pid);
    Ok(ExitCode::from(1))
}

fn cmd_status(config: &Config, json: bool) -> Result<ExitCode> {
    let messages = MessageStore::new(&config.data_dir);
    let state_store = DaemonStateStore::new(&config.data_dir);
    let report = block_on(StatusReport::collect(
        &messages,
        &state_store,
        chrono::Utc::now(),
    ))??;

    report.print(&OutputControls {
        json,
        ..Default::default()
    });

    Ok(if report.daemon == DaemonStatus::Running {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    })
}
