//! wolfies-scheduler - schedule messages for later delivery
//!
//! Writes to the same JSON queue the daemon polls. The daemon does not need
//! to be running to schedule, list or delete.
//!
//! CHANGELOG:
//! - 10/19/2026 - Scheduler CLI: schedule, list, delete, status (Claude)
//! - 01/10/2026 - Initial scaffold with CLI skeleton (Claude)

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use wolfies_scheduler::commands;
use wolfies_scheduler::commands::queue::ListFilter;
use wolfies_scheduler::config::Config;
use wolfies_scheduler::output::{self, OutputControls};
use wolfies_scheduler::store::{DaemonStateStore, MessageStore};

/// Schedule messages for later delivery by the wolfies-scheduler daemon.
#[derive(Parser, Debug)]
#[command(name = "wolfies-scheduler")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory (default: $WOLFIES_SCHEDULER_DATA_DIR or ~/.wolfies-scheduler)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Compact JSON output (no whitespace)
    #[arg(long, global = true)]
    compact: bool,

    /// Comma-separated field allowlist
    #[arg(long, global = true)]
    fields: Option<String>,

    /// Truncate text fields to this length
    #[arg(long, global = true)]
    max_text_chars: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Schedule a message
    Schedule {
        /// Phone number, email or chat id
        destination: String,

        /// RFC 3339 time or relative offset (+30s, +15m, +2h, +1d)
        time: String,

        /// Message to send
        message: Vec<String>,

        /// Read the message from a UTF-8 file
        #[arg(long, conflicts_with = "message")]
        file: Option<PathBuf>,
    },

    /// List scheduled messages (pending and failed by default)
    List {
        /// Only pending messages
        #[arg(long, conflicts_with_all = ["sent", "failed"])]
        pending: bool,

        /// Sent history
        #[arg(long, conflicts_with = "failed")]
        sent: bool,

        /// Only permanently failed messages
        #[arg(long)]
        failed: bool,
    },

    /// Delete a scheduled message by id or unique id prefix
    Delete {
        /// Message id (the 8-character prefix shown by `list` is enough)
        id: String,
    },

    /// Show daemon status and queue summary
    Status,
}

fn main() -> ExitCode {
    wolfies_scheduler::logging::init("warn", true);

    let cli = Cli::parse();

    let output_controls = OutputControls {
        json: cli.json || cli.compact,
        compact: cli.compact,
        fields: cli.fields.clone(),
        max_text_chars: cli.max_text_chars,
    };

    let mut config = Config::from_env();
    if let Some(ref dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    let result = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run(cli.command, &config, &output_controls)),
        Err(e) => Err(anyhow::anyhow!("Failed to start runtime: {}", e)),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            if output_controls.json {
                println!("{}", output::format_error(&format!("{:#}", e)));
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(1)
        }
    }
}

async fn run(command: Command, config: &Config, output: &OutputControls) -> anyhow::Result<()> {
    let messages = MessageStore::new(&config.data_dir);

    match command {
        Command::Schedule {
            destination,
            time,
            message,
            file,
        } => {
            config.ensure_data_dir()?;
            commands::schedule::schedule(
                &messages,
                &destination,
                &time,
                &message,
                file.as_deref(),
                output,
            )
            .await
        }
        Command::List {
            pending,
            sent,
            failed,
        } => {
            let filter = if pending {
                ListFilter::Pending
            } else if sent {
                ListFilter::Sent
            } else if failed {
                ListFilter::Failed
            } else {
                ListFilter::Queue
            };
            commands::queue::list(&messages, filter, output).await
        }
        Command::Delete { id } => commands::queue::delete(&messages, &id, output).await,
        Command::Status => {
            let daemon_state = DaemonStateStore::new(&config.data_dir);
            commands::status::status(&messages, &daemon_state, output).await
        }
    }
}
