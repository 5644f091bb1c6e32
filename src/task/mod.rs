//! Task invocation contract for export runs
//!
//! An export is a named unit of work keyed by table. Each invocation is one
//! attempt and ends in one of three [`TaskOutcome`]s:
//! - `Success`: the source was exhausted without error
//! - `Retry`: a transient failure; run again after `countdown` with `args`
//! - `Failed`: terminal, either non-transient or out of retries
//!
//! The run timestamp travels in [`TaskArgs`] so every retry continues the
//! same run. Attempts of one run must not overlap; nothing here locks a
//! table's prefix against a concurrent run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ExportError, TaskError};
use crate::export::{ExportCoordinator, ExportOptions, ExportResult, RunTimestamp};

pub mod registry;
pub mod scheduler;

pub use registry::ExportRegistry;
pub use scheduler::LocalScheduler;

/// Arguments of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArgs {
    /// Table to export
    pub table: String,
    /// Run being continued; a new run is started when absent
    #[serde(default)]
    pub run_timestamp: Option<RunTimestamp>,
    /// Retries already spent on this run
    #[serde(default)]
    pub retries: u32,
}

impl TaskArgs {
    /// Arguments of the first attempt of a new run
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            run_timestamp: None,
            retries: 0,
        }
    }

    /// Continue an existing run
    pub fn resume(table: impl Into<String>, run: RunTimestamp) -> Self {
        Self {
            table: table.into(),
            run_timestamp: Some(run),
            retries: 0,
        }
    }
}

/// How an attempt ended
#[derive(Debug)]
pub enum TaskOutcome {
    /// The attempt finished the run
    Success(ExportResult),
    /// Run again after `countdown`, passing `args`
    Retry {
        error: ExportError,
        countdown: Duration,
        args: TaskArgs,
    },
    /// The run is over and did not finish
    Failed(ExportError),
}

/// Source of the current time for minting run timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Export task of one registered table
pub struct ExportTask {
    coordinator: ExportCoordinator,
    clock: Arc<dyn Clock>,
}

impl ExportTask {
    pub fn new(coordinator: ExportCoordinator, clock: Arc<dyn Clock>) -> Self {
        Self { coordinator, clock }
    }

    pub fn options(&self) -> &ExportOptions {
        self.coordinator.options()
    }

    /// Run one attempt
    pub async fn run(&self, args: TaskArgs) -> TaskOutcome {
        let options = self.coordinator.options();
        let run = match args.run_timestamp {
            Some(run) => run,
            None => {
                if args.retries > 0 {
                    warn!(
                        "Retry #{} of '{}' carries no run timestamp; starting a new run",
                        args.retries, args.table
                    );
                }
                RunTimestamp::from_datetime(self.clock.now())
            }
        };
        info!(
            "Attempt {} of '{}' run {}",
            args.retries + 1,
            options.table(),
            run
        );

        let limit = options.time_limit();
        let attempt = match tokio::time::timeout(limit, self.coordinator.execute(run)).await {
            Ok(result) => result,
            Err(_) => Err(ExportError::TimeLimitExceeded {
                table: options.table().to_string(),
                limit_secs: limit.as_secs(),
            }),
        };

        match attempt {
            Ok(result) if result.cancelled => TaskOutcome::Failed(
                TaskError::Cancelled {
                    table: options.table().to_string(),
                }
                .into(),
            ),
            Ok(result) => TaskOutcome::Success(result),
            Err(e) if e.is_transient() && args.retries < options.max_retries() => {
                let countdown = options.retry_countdown();
                warn!(
                    "Attempt {} of '{}' run {} failed, retrying in {}s: {}",
                    args.retries + 1,
                    options.table(),
                    run,
                    countdown.as_secs(),
                    e
                );
                TaskOutcome::Retry {
                    error: e,
                    countdown,
                    args: TaskArgs {
                        table: args.table,
                        run_timestamp: Some(run),
                        retries: args.retries + 1,
                    },
                }
            }
            Err(e) if e.is_transient() => {
                error!(
                    "Export of '{}' run {} gave up after {} attempt(s): {}",
                    options.table(),
                    run,
                    args.retries + 1,
                    e
                );
                TaskOutcome::Failed(
                    TaskError::RetriesExhausted {
                        table: options.table().to_string(),
                        attempts: args.retries + 1,
                        last_error: Box::new(e),
                    }
                    .into(),
                )
            }
            Err(e) => {
                error!("Export of '{}' run {} failed: {}", options.table(), run, e);
                TaskOutcome::Failed(e)
            }
        }
    }
}
