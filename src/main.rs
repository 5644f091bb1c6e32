//! Chunkport - chunked, resumable table export
//!
//! Exports registered tables from MongoDB into CSV objects of a local bucket,
//! one object per chunk of rows. Interrupted runs are resumed from the objects
//! already written.
//!
//! # Usage
//!
//! ```bash
//! # Export a table, retrying transient failures in-process
//! chunkport run users
//!
//! # Continue an interrupted run
//! chunkport run users --run-timestamp 20240101T000000
//!
//! # Inspect what is stored
//! chunkport list users
//! ```

use std::sync::Arc;
use tracing::Level;

use chunkport::cli::{CliInterface, Commands};
use chunkport::error::Result;
use chunkport::export::RunTimestamp;
use chunkport::source::MongoSource;
use chunkport::task::{ExportRegistry, LocalScheduler, TaskArgs, TaskOutcome};
use tokio_util::sync::CancellationToken;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands that need no source, or run an export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand().await? {
        return Ok(());
    }

    match &cli.args().command {
        Commands::Run {
            table,
            run_timestamp,
            attempt,
            once,
        } => {
            let args = TaskArgs {
                table: table.clone(),
                run_timestamp: *run_timestamp,
                retries: *attempt,
            };
            run_export(&cli, args, *once).await
        }
        _ => Ok(()),
    }
}

/// Register every configured export and run the requested one
async fn run_export(cli: &CliInterface, args: TaskArgs, once: bool) -> Result<()> {
    // Invalid registrations abort startup before anything is connected.
    let exports = cli.config().validate()?;

    let source_config = &cli.config().source;
    let source = MongoSource::connect(&source_config.uri, &source_config.database).await?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_handle = spawn_ctrl_c_handler(cancel_token.clone());

    let mut registry = ExportRegistry::new(Arc::new(source), Arc::new(cli.object_store()))
        .with_progress(cli.show_progress())
        .with_cancellation(cancel_token);
    for options in exports {
        registry.register(options)?;
    }
    let scheduler = LocalScheduler::new(Arc::new(registry));

    let outcome = if once {
        print_outcome(scheduler.run_once(args).await)
    } else {
        scheduler
            .run_to_completion(args)
            .await
            .map(|result| print_json(&serde_json::json!({ "status": "success", "result": result })))
    };

    ctrl_c_handle.abort();
    outcome
}

/// Cancel `token` on Ctrl+C
fn spawn_ctrl_c_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("Cancelling after the current chunk...");
                token.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    })
}

/// Print the outcome of a single attempt
///
/// A retry directive is printed with the arguments the next attempt must be
/// invoked with; a terminal failure is returned as an error.
fn print_outcome(outcome: TaskOutcome) -> Result<()> {
    match outcome {
        TaskOutcome::Success(result) => {
            print_json(&serde_json::json!({ "status": "success", "result": result }));
            Ok(())
        }
        TaskOutcome::Retry {
            error,
            countdown,
            args,
        } => {
            let next = next_command(&args.table, args.run_timestamp, args.retries);
            print_json(&serde_json::json!({
                "status": "retry",
                "error": error.to_string(),
                "countdown_secs": countdown.as_secs(),
                "args": args,
                "next_command": next,
            }));
            Ok(())
        }
        TaskOutcome::Failed(e) => Err(e),
    }
}

fn next_command(table: &str, run: Option<RunTimestamp>, retries: u32) -> String {
    match run {
        Some(run) => format!(
            "chunkport run {} --run-timestamp {} --attempt {} --once",
            table, run, retries
        ),
        None => format!("chunkport run {} --attempt {} --once", table, retries),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Format error: {}", e),
    }
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    // Logs go to stderr so stdout carries only the JSON result
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
